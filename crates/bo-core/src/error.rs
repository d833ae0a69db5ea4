//! # Error Taxonomy
//!
//! Structured error types for procedure invocation, built with `thiserror`.
//!
//! Backends report failures as [`DriverError`]. The invocation engine turns
//! every one of them into a [`DomainError`] stamped with the package and
//! procedure that was being called, so upstream logging and status mapping
//! can be written once against a single type.
//!
//! ## Classification
//!
//! | Kind | Raised when |
//! |------|-------------|
//! | [`ErrorKind::Business`] | the routine raised on purpose: SQLSTATE `P0001` (`raise_exception`), or an application error number `20000..=20999` |
//! | [`ErrorKind::Connectivity`] | any other driver, transport or protocol failure |
//! | [`ErrorKind::InvalidCall`] | the call description itself is malformed |
//!
//! Sentinel return codes are not errors; they arrive as ordinary values.

use thiserror::Error;

use crate::routine::RoutineName;

/// Broad category of a [`DomainError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Transport, pool or driver failure. Not retried by the engine.
    Connectivity,
    /// The routine signalled failure by raising.
    Business,
    /// The call description does not match the requested variant.
    InvalidCall,
}

impl ErrorKind {
    /// Lower-case label used in messages and log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connectivity => "connectivity",
            Self::Business => "business",
            Self::InvalidCall => "invalid-call",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a connection backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// No connection could be obtained, or the connection broke.
    #[error("connection unavailable: {message}")]
    Connection {
        /// Driver-supplied description.
        message: String,
    },

    /// The database rejected or aborted the statement.
    #[error("database error {}: {message}", .code.as_deref().unwrap_or("(no code)"))]
    Database {
        /// Database-native error code (SQLSTATE or error number).
        code: Option<String>,
        /// Database-supplied message.
        message: String,
    },

    /// A value could not be bound as its declared type.
    #[error("cannot bind parameter {parameter}: {message}")]
    Bind {
        /// Parameter name.
        parameter: String,
        /// Why binding failed.
        message: String,
    },

    /// A column or output value could not be decoded.
    #[error("cannot decode {column}: {message}")]
    Decode {
        /// Column or output parameter name.
        column: String,
        /// Why decoding failed.
        message: String,
    },

    /// Unexpected driver state or response.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl DriverError {
    /// Database-native error code, when the failure carries one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Database { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Shorthand for a decode failure.
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }
}

/// The single error type visible above the invocation engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "{kind} failure in {package}.{procedure}{}: {message}",
    .code.as_ref().map(|c| format!(" [{c}]")).unwrap_or_default()
)]
pub struct DomainError {
    /// Category.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Package of the routine that was called.
    pub package: String,
    /// Procedure or function that was called.
    pub procedure: String,
    /// Database-native error code, when derivable.
    pub code: Option<String>,
    /// Underlying driver failure.
    #[source]
    pub cause: Option<DriverError>,
}

impl DomainError {
    /// Wrap a driver failure raised while calling `routine`.
    pub fn from_driver(routine: &RoutineName, cause: DriverError) -> Self {
        let code = cause.code().map(str::to_string);
        let kind = match code.as_deref() {
            Some(c) if is_business_code(c) => ErrorKind::Business,
            _ => ErrorKind::Connectivity,
        };
        let message = match &cause {
            DriverError::Database { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Self {
            kind,
            message,
            package: routine.package().to_string(),
            procedure: routine.procedure().to_string(),
            code,
            cause: Some(cause),
        }
    }

    /// A malformed call description for `routine`.
    pub fn invalid_call(routine: &RoutineName, message: impl Into<String>) -> Self {
        Self::invalid_call_raw(routine.package(), routine.procedure(), message)
    }

    /// A malformed call description where the routine name itself may be invalid.
    pub fn invalid_call_raw(
        package: impl Into<String>,
        procedure: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: ErrorKind::InvalidCall,
            message: message.into(),
            package: package.into(),
            procedure: procedure.into(),
            code: None,
            cause: None,
        }
    }

    /// Whether the routine raised on purpose.
    pub fn is_business(&self) -> bool {
        self.kind == ErrorKind::Business
    }

    /// Whether the failure happened below the routine (pool, network, driver).
    pub fn is_connectivity(&self) -> bool {
        self.kind == ErrorKind::Connectivity
    }

    /// `PACKAGE.PROCEDURE` of the failed call.
    pub fn routine_label(&self) -> String {
        format!("{}.{}", self.package, self.procedure)
    }
}

/// Whether a database error code denotes a deliberate raise by the routine.
///
/// Accepts SQLSTATE `P0001` (`RAISE EXCEPTION`) and application error
/// numbers `20000..=20999`, with or without an `ORA-`
/// prefix or a sign.
pub fn is_business_code(code: &str) -> bool {
    let code = code.trim();
    // Other P0 codes (no_data_found, too_many_rows, assert_failure) are
    // PL/pgSQL failures, not deliberate raises.
    if code.eq_ignore_ascii_case("P0001") {
        return true;
    }
    let digits = code
        .strip_prefix("ORA-")
        .or_else(|| code.strip_prefix("ora-"))
        .unwrap_or(code);
    let digits = digits.trim_start_matches(['-', '+']);
    matches!(digits.parse::<u32>(), Ok(n) if (20000..=20999).contains(&n))
}
