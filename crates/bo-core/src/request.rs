//! # Call Requests
//!
//! A [`CallRequest`] is the complete, immutable description of one routine
//! call: which routine, its input and output descriptors in declared order,
//! the input values, the cursors to drain, and (for functions) the return
//! type. Every call site builds its own request with [`CallRequest::builder`];
//! nothing is cached or shared between calls.
//!
//! ## Validation
//!
//! [`CallRequestBuilder::build`] rejects, as [`ErrorKind::InvalidCall`]:
//!
//! - a malformed package or procedure identifier,
//! - duplicate parameter names (case-insensitive, across inputs and outputs),
//! - an input descriptor without a value, or a value without a descriptor,
//! - an input descriptor declared `Out`, or an output declared `In`,
//! - a cursor name that is not a cursor-typed output.
//!
//! [`ErrorKind::InvalidCall`]: crate::error::ErrorKind::InvalidCall

use std::collections::{BTreeMap, HashSet};

use crate::error::DomainError;
use crate::param::{Direction, ParameterDescriptor, SqlType};
use crate::routine::{validate_identifier, RoutineName};
use crate::value::Value;

/// Immutable description of one routine call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    routine: RoutineName,
    input_params: Vec<ParameterDescriptor>,
    output_params: Vec<ParameterDescriptor>,
    input_values: BTreeMap<String, Value>,
    cursor_names: Vec<String>,
    returns: Option<SqlType>,
}

impl CallRequest {
    /// Start describing a call to `package.procedure`.
    pub fn builder(package: impl Into<String>, procedure: impl Into<String>) -> CallRequestBuilder {
        CallRequestBuilder {
            package: package.into(),
            procedure: procedure.into(),
            input_params: Vec::new(),
            output_params: Vec::new(),
            input_values: BTreeMap::new(),
            cursor_names: Vec::new(),
            returns: None,
        }
    }

    /// Target routine.
    pub fn routine(&self) -> &RoutineName {
        &self.routine
    }

    /// Input descriptors, in declared order.
    pub fn input_params(&self) -> &[ParameterDescriptor] {
        &self.input_params
    }

    /// Output descriptors, in declared order.
    pub fn output_params(&self) -> &[ParameterDescriptor] {
        &self.output_params
    }

    /// Value bound to the named input.
    pub fn input_value(&self, name: &str) -> Option<&Value> {
        self.input_values.get(name)
    }

    /// Input descriptors paired with their values, in declared order.
    pub fn bound_inputs(&self) -> impl Iterator<Item = (&ParameterDescriptor, &Value)> {
        self.input_params.iter().map(move |p| {
            // build() guarantees a value for every input descriptor.
            let value = self.input_values.get(p.name()).unwrap_or(&Value::Null);
            (p, value)
        })
    }

    /// Cursors to drain, in declared order.
    pub fn cursor_names(&self) -> &[String] {
        &self.cursor_names
    }

    /// Return type, when the routine is a function.
    pub fn returns(&self) -> Option<SqlType> {
        self.returns
    }

    /// Output descriptors that are not cursors.
    pub fn scalar_outputs(&self) -> impl Iterator<Item = &ParameterDescriptor> {
        self.output_params
            .iter()
            .filter(|p| !p.sql_type().is_cursor())
    }

    /// Cursor outputs that were declared but not requested for draining.
    pub fn unrequested_cursors(&self) -> impl Iterator<Item = &ParameterDescriptor> {
        self.output_params.iter().filter(|p| {
            p.sql_type().is_cursor() && !self.cursor_names.iter().any(|c| c == p.name())
        })
    }
}

/// Builder for [`CallRequest`].
#[derive(Debug, Clone)]
pub struct CallRequestBuilder {
    package: String,
    procedure: String,
    input_params: Vec<ParameterDescriptor>,
    output_params: Vec<ParameterDescriptor>,
    input_values: BTreeMap<String, Value>,
    cursor_names: Vec<String>,
    returns: Option<SqlType>,
}

impl CallRequestBuilder {
    /// Declare an input and bind its value in one step.
    pub fn input(mut self, name: &str, sql_type: SqlType, value: impl Into<Value>) -> Self {
        self.input_params
            .push(ParameterDescriptor::input(name, sql_type));
        self.input_values.insert(name.to_string(), value.into());
        self
    }

    /// Declare an input without binding a value (see [`Self::value`]).
    pub fn input_param(mut self, descriptor: ParameterDescriptor) -> Self {
        self.input_params.push(descriptor);
        self
    }

    /// Bind a value to a previously declared input.
    pub fn value(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.input_values.insert(name.to_string(), value.into());
        self
    }

    /// Declare a scalar output.
    pub fn output(mut self, name: &str, sql_type: SqlType) -> Self {
        self.output_params
            .push(ParameterDescriptor::output(name, sql_type));
        self
    }

    /// Declare an output from a prebuilt descriptor.
    pub fn output_param(mut self, descriptor: ParameterDescriptor) -> Self {
        self.output_params.push(descriptor);
        self
    }

    /// Declare a cursor output and request that it be drained.
    pub fn cursor(mut self, name: &str) -> Self {
        self.output_params.push(ParameterDescriptor::cursor(name));
        self.cursor_names.push(name.to_string());
        self
    }

    /// Request draining of an already declared cursor output.
    pub fn drain(mut self, name: &str) -> Self {
        self.cursor_names.push(name.to_string());
        self
    }

    /// Mark the routine as a function returning `sql_type`.
    pub fn returns(mut self, sql_type: SqlType) -> Self {
        self.returns = Some(sql_type);
        self
    }

    /// Validate and freeze the request.
    pub fn build(self) -> Result<CallRequest, DomainError> {
        let invalid =
            |msg: String| DomainError::invalid_call_raw(&self.package, &self.procedure, msg);

        let routine = RoutineName::new(self.package.clone(), self.procedure.clone())
            .map_err(|e| invalid(e.to_string()))?;

        let mut seen = HashSet::new();
        for p in self.input_params.iter().chain(&self.output_params) {
            validate_identifier(p.name()).map_err(|e| invalid(e.to_string()))?;
            if !seen.insert(p.name().to_ascii_uppercase()) {
                return Err(invalid(format!("duplicate parameter {}", p.name())));
            }
        }

        if let Some(p) = self
            .input_params
            .iter()
            .find(|p| p.direction() != Direction::In)
        {
            return Err(invalid(format!("{} is declared as an input but is not IN", p.name())));
        }
        if let Some(p) = self
            .output_params
            .iter()
            .find(|p| p.direction() != Direction::Out)
        {
            return Err(invalid(format!("{} is declared as an output but is not OUT", p.name())));
        }

        if self.input_params.len() != self.input_values.len() {
            return Err(invalid(format!(
                "{} input parameters declared but {} values bound",
                self.input_params.len(),
                self.input_values.len()
            )));
        }
        for p in &self.input_params {
            if !self.input_values.contains_key(p.name()) {
                return Err(invalid(format!("no value bound for input {}", p.name())));
            }
        }

        let mut requested = HashSet::new();
        for name in &self.cursor_names {
            if !requested.insert(name.as_str()) {
                return Err(invalid(format!("cursor {name} requested twice")));
            }
            let declared = self
                .output_params
                .iter()
                .any(|p| p.name() == name && p.sql_type().is_cursor());
            if !declared {
                return Err(invalid(format!(
                    "cursor {name} is not a cursor-typed output parameter"
                )));
            }
        }

        if self.returns == Some(SqlType::Cursor) {
            return Err(invalid("functions returning cursors are not supported".into()));
        }

        Ok(CallRequest {
            routine,
            input_params: self.input_params,
            output_params: self.output_params,
            input_values: self.input_values,
            cursor_names: self.cursor_names,
            returns: self.returns,
        })
    }
}
