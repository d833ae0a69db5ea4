//! # Cursor Rows and Row Mapping
//!
//! A cursor hands back [`CursorRow`]s: positional values plus the column
//! list the cursor exposes for this call. Columns are discovered per call,
//! because the same routine can return different projections depending on
//! its inputs.
//!
//! A [`RowMapper`] turns one `CursorRow` into an application record. The
//! engine calls it exactly once per row, in cursor order, and the mapper only
//! borrows the row for the duration of that call. [`ColumnMapper`] is the
//! generic mapper producing a [`Row`], an ordered column-name → value record.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::DriverError;
use crate::value::Value;

/// Column metadata as reported by the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    name: String,
    type_name: String,
}

impl Column {
    /// Describe a column.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }

    /// Column name, case as reported.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Database type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

/// One positional row of an open cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorRow {
    columns: Arc<[Column]>,
    values: Vec<Value>,
}

impl CursorRow {
    /// Pair decoded values with the cursor's column list.
    pub fn new(columns: Arc<[Column]>, values: Vec<Value>) -> Result<Self, DriverError> {
        if columns.len() != values.len() {
            return Err(DriverError::Protocol(format!(
                "row has {} values for {} columns",
                values.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, values })
    }

    /// Columns exposed by the cursor.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Values in column order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the cursor exposes no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value of the named column (exact match first, then case-insensitive).
    pub fn by_name(&self, name: &str) -> Option<&Value> {
        position(self.columns.iter().map(Column::name), name).map(|i| &self.values[i])
    }
}

/// Ordered column-name → value record. Column names keep their case.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    entries: Vec<(String, Value)>,
}

impl Row {
    /// An empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Builder-style [`Self::push`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(name, value);
        self
    }

    /// Value of the named column (exact match first, then case-insensitive).
    pub fn get(&self, name: &str) -> Option<&Value> {
        position(self.entries.iter().map(|(n, _)| n.as_str()), name).map(|i| &self.entries[i].1)
    }

    /// Character data of a non-null column.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Integer view of a column.
    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    /// Decimal view of a column.
    pub fn decimal(&self, name: &str) -> Option<Decimal> {
        self.get(name).and_then(Value::as_decimal)
    }

    /// Flag view of a column.
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// Date view of a column.
    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        self.get(name).and_then(Value::as_date)
    }

    /// Timestamp view of a column.
    pub fn timestamp(&self, name: &str) -> Option<NaiveDateTime> {
        self.get(name).and_then(Value::as_timestamp)
    }

    /// Column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Columns and values in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the record has no columns.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

fn position<'a>(mut names: impl Iterator<Item = &'a str> + Clone, wanted: &str) -> Option<usize> {
    names
        .clone()
        .position(|n| n == wanted)
        .or_else(|| names.position(|n| n.eq_ignore_ascii_case(wanted)))
}

/// Maps one cursor row into an application record.
pub trait RowMapper<T>: Send + Sync {
    /// Produce exactly one record for `row`.
    fn map_row(&self, row: &CursorRow) -> Result<T, DriverError>;
}

impl<T, F> RowMapper<T> for F
where
    F: Fn(&CursorRow) -> Result<T, DriverError> + Send + Sync,
{
    fn map_row(&self, row: &CursorRow) -> Result<T, DriverError> {
        self(row)
    }
}

/// Maps every exposed column into a [`Row`], preserving column order and case.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnMapper;

impl RowMapper<Row> for ColumnMapper {
    fn map_row(&self, row: &CursorRow) -> Result<Row, DriverError> {
        Ok(row
            .columns()
            .iter()
            .zip(row.values())
            .map(|(c, v)| (c.name().to_string(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor_row() -> CursorRow {
        let columns: Arc<[Column]> = vec![
            Column::new("PACKAGE_NAME", "VARCHAR"),
            Column::new("procedure_name", "VARCHAR"),
            Column::new("ACTIVE", "BOOL"),
        ]
        .into();
        CursorRow::new(
            columns,
            vec![Value::from("BO_CUSTOMER"), Value::from("FIND"), Value::Flag(true)],
        )
        .unwrap()
    }

    #[test]
    fn column_mapper_preserves_order_and_case() {
        let row = ColumnMapper.map_row(&cursor_row()).unwrap();
        let names: Vec<_> = row.columns().collect();
        assert_eq!(names, ["PACKAGE_NAME", "procedure_name", "ACTIVE"]);
    }

    #[test]
    fn lookup_falls_back_to_case_insensitive() {
        let row = ColumnMapper.map_row(&cursor_row()).unwrap();
        assert_eq!(row.text("PROCEDURE_NAME"), Some("FIND"));
        assert_eq!(row.text("package_name"), Some("BO_CUSTOMER"));
        assert_eq!(row.flag("active"), Some(true));
        assert!(row.get("MISSING").is_none());
    }

    #[test]
    fn exact_match_wins_over_case_insensitive() {
        let row = Row::new().with("id", 1).with("ID", 2);
        assert_eq!(row.integer("ID"), Some(2));
        assert_eq!(row.integer("id"), Some(1));
        assert_eq!(row.integer("Id"), Some(1));
    }

    #[test]
    fn cursor_row_rejects_width_mismatch() {
        let columns: Arc<[Column]> = vec![Column::new("A", "INT8")].into();
        assert!(CursorRow::new(columns, vec![]).is_err());
    }

    #[test]
    fn closures_are_mappers() {
        let mapper = |row: &CursorRow| -> Result<String, DriverError> {
            row.by_name("package_name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| DriverError::decode("PACKAGE_NAME", "missing"))
        };
        assert_eq!(mapper.map_row(&cursor_row()).unwrap(), "BO_CUSTOMER");
    }

    #[test]
    fn row_serializes_as_ordered_map() {
        let row = Row::new().with("Z", 1).with("A", Value::Null);
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"Z":1,"A":null}"#);
    }
}
