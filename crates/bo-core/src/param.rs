//! # Parameter Descriptors
//!
//! A [`ParameterDescriptor`] declares one argument of a routine call: its
//! name, whether the caller supplies it or the routine fills it in, and the
//! database type it is bound as. Descriptors are rebuilt at every call site
//! and discarded when the call returns.

use serde::{Deserialize, Serialize};

/// Database type tag of a call argument or return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SqlType {
    /// Variable-length character data.
    Varchar,
    /// Fixed-length character data.
    Char,
    /// Character large object.
    Clob,
    /// Exact numeric with arbitrary scale.
    Number,
    /// 64-bit integer.
    Integer,
    /// Calendar date without time of day.
    Date,
    /// Date and time of day without zone.
    Timestamp,
    /// Boolean-like flag (`Y`/`N` in legacy schemas).
    Flag,
    /// Binary large object.
    Blob,
    /// Server-side forward-only result set handle.
    Cursor,
}

impl SqlType {
    /// Whether this type denotes a result cursor.
    pub fn is_cursor(self) -> bool {
        matches!(self, Self::Cursor)
    }

    /// Canonical upper-case tag, as accepted by [`SqlType::parse`].
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Varchar => "VARCHAR",
            Self::Char => "CHAR",
            Self::Clob => "CLOB",
            Self::Number => "NUMBER",
            Self::Integer => "INTEGER",
            Self::Date => "DATE",
            Self::Timestamp => "TIMESTAMP",
            Self::Flag => "FLAG",
            Self::Blob => "BLOB",
            Self::Cursor => "CURSOR",
        }
    }

    /// Parse a type tag, case-insensitively. Accepts a few common aliases
    /// (`VARCHAR2`, `NUMERIC`, `BOOLEAN`, `REFCURSOR`, ...).
    pub fn parse(tag: &str) -> Option<Self> {
        let ty = match tag.trim().to_ascii_uppercase().as_str() {
            "VARCHAR" | "VARCHAR2" | "TEXT" | "STRING" => Self::Varchar,
            "CHAR" => Self::Char,
            "CLOB" => Self::Clob,
            "NUMBER" | "NUMERIC" | "DECIMAL" => Self::Number,
            "INTEGER" | "INT" | "BIGINT" => Self::Integer,
            "DATE" => Self::Date,
            "TIMESTAMP" => Self::Timestamp,
            "FLAG" | "BOOLEAN" | "BOOL" => Self::Flag,
            "BLOB" | "BYTEA" => Self::Blob,
            "CURSOR" | "REFCURSOR" | "SYS_REFCURSOR" => Self::Cursor,
            _ => return None,
        };
        Some(ty)
    }
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a call argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Supplied by the caller.
    In,
    /// Populated by the routine and read back after execution.
    Out,
}

/// Declaration of one call argument. Fields are fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    name: String,
    direction: Direction,
    sql_type: SqlType,
}

impl ParameterDescriptor {
    /// Declare an input argument.
    pub fn input(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            direction: Direction::In,
            sql_type,
        }
    }

    /// Declare an output argument.
    pub fn output(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            direction: Direction::Out,
            sql_type,
        }
    }

    /// Declare a cursor output argument.
    pub fn cursor(name: impl Into<String>) -> Self {
        Self::output(name, SqlType::Cursor)
    }

    /// Argument name as declared by the routine.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Argument direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Declared database type.
    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }
}
