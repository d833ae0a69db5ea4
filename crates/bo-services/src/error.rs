//! Service-level errors.

use bo_core::{DomainError, ErrorKind};
use thiserror::Error;

/// Failure of a domain service operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The underlying routine call failed.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The routine succeeded but returned something the service cannot use.
    #[error("unexpected result from {routine}: {detail}")]
    UnexpectedResult {
        /// `PACKAGE.PROCEDURE` that was called.
        routine: String,
        /// What was missing or malformed.
        detail: String,
    },
}

impl ServiceError {
    pub(crate) fn unexpected(routine: impl ToString, detail: impl Into<String>) -> Self {
        Self::UnexpectedResult {
            routine: routine.to_string(),
            detail: detail.into(),
        }
    }

    /// Error category of the failed call, if it was a call failure.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Domain(err) => Some(err.kind),
            Self::UnexpectedResult { .. } => None,
        }
    }

    /// Whether a routine raised on purpose.
    pub fn is_business(&self) -> bool {
        self.kind() == Some(ErrorKind::Business)
    }
}
