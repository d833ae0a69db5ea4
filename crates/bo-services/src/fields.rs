//! Typed column and output access for record mappers.

use bo_core::{result, CursorRow, DriverError, Outputs, Value};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use crate::error::ServiceError;

fn required<T>(
    row: &CursorRow,
    column: &str,
    expected: &str,
    view: impl Fn(&Value) -> Option<T>,
) -> Result<T, DriverError> {
    match row.by_name(column) {
        None => Err(DriverError::decode(column, "column missing from cursor")),
        Some(Value::Null) => Err(DriverError::decode(column, "unexpected null")),
        Some(value) => view(value).ok_or_else(|| {
            DriverError::decode(column, format!("expected {expected}, found {}", value.kind()))
        }),
    }
}

fn optional<T>(
    row: &CursorRow,
    column: &str,
    expected: &str,
    view: impl Fn(&Value) -> Option<T>,
) -> Result<Option<T>, DriverError> {
    match row.by_name(column) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => view(value).map(Some).ok_or_else(|| {
            DriverError::decode(column, format!("expected {expected}, found {}", value.kind()))
        }),
    }
}

pub(crate) fn text(row: &CursorRow, column: &str) -> Result<String, DriverError> {
    required(row, column, "text", |v| v.as_str().map(str::to_owned))
}

pub(crate) fn opt_text(row: &CursorRow, column: &str) -> Result<Option<String>, DriverError> {
    optional(row, column, "text", |v| v.as_str().map(str::to_owned))
}

pub(crate) fn integer(row: &CursorRow, column: &str) -> Result<i64, DriverError> {
    required(row, column, "integer", Value::as_i64)
}

pub(crate) fn opt_integer(row: &CursorRow, column: &str) -> Result<Option<i64>, DriverError> {
    optional(row, column, "integer", Value::as_i64)
}

pub(crate) fn decimal(row: &CursorRow, column: &str) -> Result<Decimal, DriverError> {
    required(row, column, "number", Value::as_decimal)
}

pub(crate) fn flag(row: &CursorRow, column: &str) -> Result<bool, DriverError> {
    required(row, column, "flag", Value::as_bool)
}

pub(crate) fn date(row: &CursorRow, column: &str) -> Result<NaiveDate, DriverError> {
    required(row, column, "date", Value::as_date)
}

pub(crate) fn timestamp(row: &CursorRow, column: &str) -> Result<NaiveDateTime, DriverError> {
    required(row, column, "timestamp", Value::as_timestamp)
}

pub(crate) fn opt_timestamp(
    row: &CursorRow,
    column: &str,
) -> Result<Option<NaiveDateTime>, DriverError> {
    optional(row, column, "timestamp", Value::as_timestamp)
}

/// Output that may legitimately be null.
pub(crate) fn output<'a>(outputs: &'a Outputs, name: &str) -> Option<&'a Value> {
    result::output(outputs, name).filter(|v| !v.is_null())
}

/// Output the routine must set.
pub(crate) fn required_output<'a>(
    routine: impl ToString,
    outputs: &'a Outputs,
    name: &str,
) -> Result<&'a Value, ServiceError> {
    output(outputs, name).ok_or_else(|| ServiceError::unexpected(routine, format!("{name} was not set")))
}
