//! Result containers returned by the output- and cursor-bearing call variants.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::row::Row;
use crate::value::Value;

/// Named output-parameter values of one call (cursor outputs excluded).
pub type Outputs = BTreeMap<String, Value>;

/// Look up an output by name, exact match first, then case-insensitive.
pub fn output<'a>(outputs: &'a Outputs, name: &str) -> Option<&'a Value> {
    outputs.get(name).or_else(|| {
        outputs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    })
}

/// Rows drained from one cursor plus the call's scalar outputs.
///
/// Owned by the caller; nothing in it refers back to the connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CursorResult<T = Row> {
    /// Mapped rows, in cursor order.
    pub rows: Vec<T>,
    /// Scalar output parameters.
    pub outputs: Outputs,
}

impl<T> CursorResult<T> {
    /// Output value by name.
    pub fn output(&self, name: &str) -> Option<&Value> {
        output(&self.outputs, name)
    }
}

/// Rows of several cursors drained by one call, keyed by cursor name in
/// declaration order, plus the call's scalar outputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CursorSet<T = Row> {
    cursors: Vec<(String, Vec<T>)>,
    outputs: Outputs,
}

impl<T> CursorSet<T> {
    /// Assemble a set; `cursors` keeps the caller's declaration order.
    pub fn new(cursors: Vec<(String, Vec<T>)>, outputs: Outputs) -> Self {
        Self { cursors, outputs }
    }

    /// Rows of the named cursor.
    pub fn rows(&self, cursor: &str) -> Option<&[T]> {
        self.cursors
            .iter()
            .find(|(name, _)| name == cursor)
            .map(|(_, rows)| rows.as_slice())
    }

    /// Cursor names in declaration order.
    pub fn cursor_names(&self) -> impl Iterator<Item = &str> {
        self.cursors.iter().map(|(name, _)| name.as_str())
    }

    /// Scalar outputs shared by every cursor of the call.
    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    /// Output value by name.
    pub fn output(&self, name: &str) -> Option<&Value> {
        output(&self.outputs, name)
    }

    /// Remove one cursor's rows as a standalone [`CursorResult`].
    pub fn take(&mut self, cursor: &str) -> Option<CursorResult<T>> {
        let index = self.cursors.iter().position(|(name, _)| name == cursor)?;
        let (_, rows) = self.cursors.remove(index);
        Some(CursorResult {
            rows,
            outputs: self.outputs.clone(),
        })
    }

    /// One [`CursorResult`] per cursor, in declaration order.
    pub fn into_results(self) -> Vec<(String, CursorResult<T>)> {
        let outputs = self.outputs;
        self.cursors
            .into_iter()
            .map(|(name, rows)| {
                (
                    name,
                    CursorResult {
                        rows,
                        outputs: outputs.clone(),
                    },
                )
            })
            .collect()
    }
}
