//! # Dynamic Values
//!
//! [`Value`] is the dynamically typed scalar that flows in both directions
//! through a routine call: bound input values, output parameters, function
//! results, and cursor columns.
//!
//! ## Null handling
//!
//! [`Value::Null`] is a value in its own right, never a missing value, and
//! it is never equal to `Integer(0)` or an empty string. It coerces to every
//! [`SqlType`], so a null bound against any declared type cannot fail on a
//! type mismatch.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::param::SqlType;

/// Dynamically typed scalar exchanged with the database.
///
/// Serializes untagged for display. There is no `Deserialize`: the JSON
/// form does not say whether `"2024-01-01"` was text or a date.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// Boolean-like flag.
    Flag(bool),
    /// 64-bit integer.
    Integer(i64),
    /// Exact decimal number.
    Number(Decimal),
    /// Date and time of day.
    Timestamp(NaiveDateTime),
    /// Calendar date.
    Date(NaiveDate),
    /// Character data.
    Text(String),
    /// Binary data.
    Blob(Vec<u8>),
}

/// A value could not be converted to the declared type of its parameter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot bind {kind} value as {target}: {detail}")]
pub struct CoercionError {
    /// Kind of the offending value (see [`Value::kind`]).
    pub kind: &'static str,
    /// Declared target type.
    pub target: SqlType,
    /// What went wrong.
    pub detail: String,
}

impl Value {
    /// Short name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Flag(_) => "flag",
            Self::Integer(_) => "integer",
            Self::Number(_) => "number",
            Self::Timestamp(_) => "timestamp",
            Self::Date(_) => "date",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
        }
    }

    /// Whether this is SQL `NULL`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrow character data.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view: integers, and numbers without a fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Number(d) if d.fract().is_zero() => d.to_i64(),
            _ => None,
        }
    }

    /// Decimal view of integers and numbers.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Integer(i) => Some(Decimal::from(*i)),
            Self::Number(d) => Some(*d),
            _ => None,
        }
    }

    /// Flag view. Accepts the legacy `Y`/`N` character encoding.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(*b),
            Self::Text(s) => parse_flag(s),
            Self::Integer(0) => Some(false),
            Self::Integer(1) => Some(true),
            _ => None,
        }
    }

    /// Date view. Timestamps are truncated to their date.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            Self::Timestamp(ts) => Some(ts.date()),
            _ => None,
        }
    }

    /// Timestamp view. Dates are taken at midnight.
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            Self::Date(d) => Some(d.and_time(NaiveTime::MIN)),
            _ => None,
        }
    }

    /// Borrow binary data.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// Convert this value to the representation of `target`.
    ///
    /// `Null` converts to every type. Lossy conversions (a fractional
    /// number into an integer, unparseable text into a number) fail.
    pub fn coerce_to(&self, target: SqlType) -> Result<Value, CoercionError> {
        let fail = |detail: &str| CoercionError {
            kind: self.kind(),
            target,
            detail: detail.to_string(),
        };

        if self.is_null() {
            return Ok(Value::Null);
        }

        match target {
            SqlType::Varchar | SqlType::Char | SqlType::Clob => match self {
                Self::Text(s) => Ok(Value::Text(s.clone())),
                Self::Integer(i) => Ok(Value::Text(i.to_string())),
                Self::Number(d) => Ok(Value::Text(d.to_string())),
                Self::Flag(b) => Ok(Value::Text(if *b { "Y" } else { "N" }.to_string())),
                Self::Date(d) => Ok(Value::Text(d.format("%Y-%m-%d").to_string())),
                Self::Timestamp(ts) => {
                    Ok(Value::Text(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
                }
                Self::Blob(_) | Self::Null => Err(fail("no character representation")),
            },
            SqlType::Number => match self {
                Self::Number(d) => Ok(Value::Number(*d)),
                Self::Integer(i) => Ok(Value::Number(Decimal::from(*i))),
                Self::Text(s) => s
                    .trim()
                    .parse::<Decimal>()
                    .map(Value::Number)
                    .map_err(|e| fail(&e.to_string())),
                _ => Err(fail("not numeric")),
            },
            SqlType::Integer => match self {
                Self::Integer(i) => Ok(Value::Integer(*i)),
                Self::Number(_) => self
                    .as_i64()
                    .map(Value::Integer)
                    .ok_or_else(|| fail("fractional or out of range")),
                Self::Text(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::Integer)
                    .map_err(|e| fail(&e.to_string())),
                _ => Err(fail("not an integer")),
            },
            SqlType::Date => match self {
                Self::Date(d) => Ok(Value::Date(*d)),
                Self::Timestamp(ts) => Ok(Value::Date(ts.date())),
                Self::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                    .map(Value::Date)
                    .map_err(|e| fail(&e.to_string())),
                _ => Err(fail("not a date")),
            },
            SqlType::Timestamp => match self {
                Self::Timestamp(ts) => Ok(Value::Timestamp(*ts)),
                Self::Date(d) => Ok(Value::Timestamp(d.and_time(NaiveTime::MIN))),
                Self::Text(s) => parse_timestamp(s.trim())
                    .map(Value::Timestamp)
                    .ok_or_else(|| fail("expected YYYY-MM-DD[T ]HH:MM:SS[.fff]")),
                _ => Err(fail("not a timestamp")),
            },
            SqlType::Flag => self
                .as_bool()
                .map(Value::Flag)
                .ok_or_else(|| fail("expected Y/N, true/false or 0/1")),
            SqlType::Blob => match self {
                Self::Blob(b) => Ok(Value::Blob(b.clone())),
                Self::Text(s) => Ok(Value::Blob(s.as_bytes().to_vec())),
                _ => Err(fail("not binary")),
            },
            SqlType::Cursor => match self {
                Self::Text(s) => Ok(Value::Text(s.clone())),
                _ => Err(fail("cursor handles are bound by name")),
            },
        }
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_uppercase().as_str() {
        "Y" | "YES" | "TRUE" | "1" => Some(true),
        "N" | "NO" | "FALSE" | "0" => Some(false),
        _ => None,
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Flag(b) => f.write_str(if *b { "Y" } else { "N" }),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Number(d) => write!(f, "{d}"),
            Self::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%dT%H:%M:%S%.f")),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::Text(s) => f.write_str(s),
            Self::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Self::Number(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Flag(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Self::Timestamp(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
