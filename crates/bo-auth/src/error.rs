//! Authorization failures.

use bo_core::DomainError;
use thiserror::Error;

/// Why a principal may not call a routine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The principal's permission set does not contain the routine.
    #[error("{principal} may not call {permission}")]
    AccessDenied {
        /// Normalized principal.
        principal: String,
        /// `PACKAGE.PROCEDURE` that was refused.
        permission: String,
    },

    /// The permission set could not be loaded.
    #[error(transparent)]
    Lookup(#[from] DomainError),
}
