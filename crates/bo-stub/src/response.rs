// SPDX-License-Identifier: BUSL-1.1
//! Scripted responses returned by routine handlers.

use std::collections::HashMap;
use std::sync::Arc;

use bo_core::{Column, Row, Value};

/// Rows a scripted cursor yields, with its column list.
#[derive(Debug, Clone, PartialEq)]
pub struct StubCursor {
    pub(crate) columns: Arc<[Column]>,
    pub(crate) rows: Vec<Vec<Value>>,
}

impl Default for StubCursor {
    fn default() -> Self {
        Self {
            columns: Arc::from(Vec::new()),
            rows: Vec::new(),
        }
    }
}

impl StubCursor {
    /// A cursor exposing `columns` and no rows yet.
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| Column::new(*c, "UNKNOWN")).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a positional row. Missing trailing values are `NULL`.
    pub fn row(mut self, values: Vec<Value>) -> Self {
        let mut values = values;
        values.resize(self.columns.len(), Value::Null);
        self.rows.push(values);
        self
    }

    /// Build a cursor from records. The first record fixes the column list;
    /// later records are projected onto it by name.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let Some(first) = rows.first() else {
            return Self::default();
        };
        let columns: Arc<[Column]> = first
            .iter()
            .map(|(name, value)| Column::new(name, value.kind().to_ascii_uppercase()))
            .collect();
        let rows = rows
            .iter()
            .map(|r| {
                columns
                    .iter()
                    .map(|c| r.get(c.name()).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the cursor yields nothing.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// What a routine hands back for one execution.
#[derive(Debug, Clone, PartialEq)]
pub struct StubResponse {
    pub(crate) return_value: Value,
    pub(crate) outputs: HashMap<String, Value>,
    pub(crate) cursors: HashMap<String, StubCursor>,
}

impl Default for StubResponse {
    fn default() -> Self {
        Self {
            return_value: Value::Null,
            outputs: HashMap::new(),
            cursors: HashMap::new(),
        }
    }
}

impl StubResponse {
    /// An empty response: null return value, null outputs, no cursors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the function result.
    pub fn returning(mut self, value: impl Into<Value>) -> Self {
        self.return_value = value.into();
        self
    }

    /// Set an output parameter (name matched case-insensitively).
    pub fn output(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.outputs.insert(name.to_ascii_uppercase(), value.into());
        self
    }

    /// Open a cursor on the named output parameter.
    pub fn cursor(mut self, name: &str, cursor: StubCursor) -> Self {
        self.cursors.insert(name.to_ascii_uppercase(), cursor);
        self
    }
}
