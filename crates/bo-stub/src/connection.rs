// SPDX-License-Identifier: BUSL-1.1
//! Leased stub connection.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use bo_core::{
    CallForm, CursorRow, DriverError, ParameterDescriptor, RoutineConnection, RoutineName, Value,
};

use crate::response::StubResponse;
use crate::{Inner, Invocation, Stage};

/// One lease on a [`StubDatabase`](crate::StubDatabase). Dropping it counts
/// as a release.
pub struct StubConnection {
    db: Arc<Inner>,
    inputs: Vec<(ParameterDescriptor, Value)>,
    outputs: Vec<ParameterDescriptor>,
    form: Option<CallForm>,
    response: Option<StubResponse>,
    positions: HashMap<String, usize>,
    closed: HashSet<String>,
}

impl StubConnection {
    pub(crate) fn new(db: Arc<Inner>) -> Self {
        Self {
            db,
            inputs: Vec::new(),
            outputs: Vec::new(),
            form: None,
            response: None,
            positions: HashMap::new(),
            closed: HashSet::new(),
        }
    }

    fn executed(&self) -> Result<&StubResponse, DriverError> {
        self.response
            .as_ref()
            .ok_or_else(|| DriverError::Protocol("routine has not been executed".into()))
    }

    fn registered(&self, name: &str) -> Result<&ParameterDescriptor, DriverError> {
        self.outputs
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| DriverError::Protocol(format!("{name} is not a registered output")))
    }
}

impl Drop for StubConnection {
    fn drop(&mut self) {
        self.db.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RoutineConnection for StubConnection {
    fn bind(&mut self, param: &ParameterDescriptor, value: &Value) -> Result<(), DriverError> {
        self.db.check(Stage::Bind)?;
        let coerced = value
            .coerce_to(param.sql_type())
            .map_err(|e| DriverError::Bind {
                parameter: param.name().to_string(),
                message: e.to_string(),
            })?;
        self.inputs.push((param.clone(), coerced));
        Ok(())
    }

    fn register_output(&mut self, param: &ParameterDescriptor) -> Result<(), DriverError> {
        self.outputs.push(param.clone());
        Ok(())
    }

    async fn execute(&mut self, routine: &RoutineName, form: CallForm) -> Result<(), DriverError> {
        self.db.check(Stage::Execute)?;

        let latency = *self.db.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let handler = self.db.handler(routine).ok_or_else(|| DriverError::Database {
            code: Some("42883".into()),
            message: format!("routine {routine} does not exist"),
        })?;

        let invocation = Invocation {
            routine: routine.clone(),
            form,
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
        };
        self.db.calls.lock().push(invocation.clone());

        let response = handler(&invocation)?;
        self.form = Some(form);
        self.response = Some(response);
        Ok(())
    }

    async fn fetch(&mut self, cursor: &str, max_rows: usize) -> Result<Vec<CursorRow>, DriverError> {
        self.db.check(Stage::Fetch)?;
        let param = self.registered(cursor)?;
        if !param.sql_type().is_cursor() {
            return Err(DriverError::Protocol(format!("{cursor} is not a cursor")));
        }
        let key = cursor.to_ascii_uppercase();
        if self.closed.contains(&key) {
            return Err(DriverError::Protocol(format!("cursor {cursor} is closed")));
        }

        let Some(scripted) = self.executed()?.cursors.get(&key).cloned() else {
            // The routine never opened this cursor.
            return Ok(Vec::new());
        };
        let start = self.positions.get(&key).copied().unwrap_or(0);
        let end = (start + max_rows).min(scripted.rows.len());
        let batch = scripted.rows[start.min(end)..end]
            .iter()
            .map(|values| CursorRow::new(Arc::clone(&scripted.columns), values.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        self.positions.insert(key, end);
        Ok(batch)
    }

    async fn close_cursor(&mut self, cursor: &str) -> Result<(), DriverError> {
        self.db.check(Stage::Close)?;
        self.registered(cursor)?;
        if self.closed.insert(cursor.to_ascii_uppercase()) {
            self.db.cursors_closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn return_value(&mut self) -> Result<Value, DriverError> {
        self.db.check(Stage::Output)?;
        let response = self.executed()?;
        match self.form {
            Some(CallForm::Function { returns }) => response
                .return_value
                .coerce_to(returns)
                .map_err(|e| DriverError::decode("return value", e.to_string())),
            _ => Err(DriverError::Protocol("routine was not called as a function".into())),
        }
    }

    fn output(&mut self, name: &str) -> Result<Value, DriverError> {
        self.db.check(Stage::Output)?;
        let sql_type = self.registered(name)?.sql_type();
        let value = self
            .executed()?
            .outputs
            .get(&name.to_ascii_uppercase())
            .cloned()
            .unwrap_or(Value::Null);
        value
            .coerce_to(sql_type)
            .map_err(|e| DriverError::decode(name, e.to_string()))
    }

    async fn finish(&mut self) -> Result<(), DriverError> {
        self.db.check(Stage::Finish)?;
        self.executed()?;
        let latency = *self.db.commit_latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.db.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
