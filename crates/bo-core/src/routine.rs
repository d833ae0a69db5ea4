//! # Routine Names
//!
//! A [`RoutineName`] identifies one procedure or function inside a database
//! package. Both halves are validated as plain SQL identifiers at
//! construction, so backends can splice them into call text unquoted.

use serde::{Deserialize, Serialize};

/// Package-qualified routine name, displayed as `PACKAGE.PROCEDURE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoutineName {
    package: String,
    procedure: String,
}

/// Rejection reason for a malformed routine name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid routine identifier \"{0}\" (expected [A-Za-z_][A-Za-z0-9_$#]*)")]
pub struct InvalidIdentifier(
    /// The rejected identifier.
    pub String,
);

impl RoutineName {
    /// Build a routine name, validating both identifiers.
    pub fn new(
        package: impl Into<String>,
        procedure: impl Into<String>,
    ) -> Result<Self, InvalidIdentifier> {
        let package = package.into();
        let procedure = procedure.into();
        validate_identifier(&package)?;
        validate_identifier(&procedure)?;
        Ok(Self { package, procedure })
    }

    /// Parse `PACKAGE.PROCEDURE`.
    pub fn parse(qualified: &str) -> Result<Self, InvalidIdentifier> {
        match qualified.trim().split_once('.') {
            Some((package, procedure)) => Self::new(package, procedure),
            None => Err(InvalidIdentifier(qualified.to_string())),
        }
    }

    /// Package (schema) name as supplied.
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Procedure or function name as supplied.
    pub fn procedure(&self) -> &str {
        &self.procedure
    }

    /// Upper-cased `PACKAGE.PROCEDURE`, the form used in permission sets.
    pub fn permission_key(&self) -> String {
        format!(
            "{}.{}",
            self.package.to_ascii_uppercase(),
            self.procedure.to_ascii_uppercase()
        )
    }
}

impl std::fmt::Display for RoutineName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.package, self.procedure)
    }
}

/// Check that `ident` is a plain, unquoted SQL identifier.
pub fn validate_identifier(ident: &str) -> Result<(), InvalidIdentifier> {
    let mut chars = ident.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '#'))
        }
        None => false,
    };
    if valid && ident.len() <= 128 {
        Ok(())
    } else {
        Err(InvalidIdentifier(ident.to_string()))
    }
}
