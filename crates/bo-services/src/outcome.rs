//! # Result-Code Outcomes
//!
//! Write routines report their verdict through an integer `P_RESULT`
//! output instead of raising:
//!
//! | Code | Meaning |
//! |------|---------|
//! | `0` | done |
//! | `> 0` | done; the code is the identifier of the created record |
//! | `< 0` | refused; the package's reason table explains the code |
//!
//! This is the only place the convention is interpreted. The engine hands
//! codes back untouched.

use bo_core::{result, CallRequest, Outputs, Value};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Known refusal codes of one package, with their explanations.
pub type ReasonTable = &'static [(i64, &'static str)];

/// Name of the result-code output shared by write routines.
pub const RESULT_PARAM: &str = "P_RESULT";

/// Verdict of a write routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Outcome<T> {
    /// The routine did what was asked.
    Completed(T),
    /// The routine refused.
    Rejected {
        /// Negative result code.
        code: i64,
        /// Explanation from the package's reason table.
        reason: String,
    },
}

impl<T> Outcome<T> {
    /// Whether the routine did what was asked.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// The completed value, if any.
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Rejected { .. } => None,
        }
    }

    /// Transform the completed value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Completed(value) => Outcome::Completed(f(value)),
            Self::Rejected { code, reason } => Outcome::Rejected { code, reason },
        }
    }
}

/// Interpret a raw result code against `reasons`.
pub fn interpret_code(code: i64, reasons: ReasonTable) -> Outcome<i64> {
    if code >= 0 {
        return Outcome::Completed(code);
    }
    Outcome::Rejected {
        code,
        reason: reason_for(code, reasons),
    }
}

/// Explanation of a refusal code; unknown codes get a generic text.
pub fn reason_for(code: i64, reasons: ReasonTable) -> String {
    reasons
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, reason)| (*reason).to_string())
        .unwrap_or_else(|| format!("refused with code {code}"))
}

/// Read `P_RESULT` from a call's outputs and interpret it.
pub(crate) fn outcome_of(
    req: &CallRequest,
    outputs: &Outputs,
    reasons: ReasonTable,
) -> Result<Outcome<i64>, ServiceError> {
    let code = match result::output(outputs, RESULT_PARAM) {
        Some(Value::Null) | None => {
            return Err(ServiceError::unexpected(
                req.routine(),
                format!("{RESULT_PARAM} was not set"),
            ))
        }
        Some(value) => value.as_i64().ok_or_else(|| {
            ServiceError::unexpected(
                req.routine(),
                format!("{RESULT_PARAM} is not an integer: {value}"),
            )
        })?,
    };
    let outcome = interpret_code(code, reasons);
    if let Outcome::Rejected { code, reason } = &outcome {
        tracing::info!(routine = %req.routine(), code, reason = %reason, "routine refused request");
    }
    Ok(outcome)
}

/// Like [`outcome_of`], for routines whose success code is the new record's
/// identifier. A zero code is an unusable answer.
pub(crate) fn created_of(
    req: &CallRequest,
    outputs: &Outputs,
    reasons: ReasonTable,
) -> Result<Outcome<i64>, ServiceError> {
    match outcome_of(req, outputs, reasons)? {
        Outcome::Completed(0) => Err(ServiceError::unexpected(
            req.routine(),
            "completed without returning an identifier",
        )),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bo_core::SqlType;

    const REASONS: ReasonTable = &[(-1, "not found"), (-2, "already closed")];

    #[test]
    fn zero_and_positive_codes_complete() {
        assert_eq!(interpret_code(0, REASONS), Outcome::Completed(0));
        assert_eq!(interpret_code(812, REASONS), Outcome::Completed(812));
    }

    #[test]
    fn negative_codes_are_explained() {
        assert_eq!(
            interpret_code(-2, REASONS),
            Outcome::Rejected {
                code: -2,
                reason: "already closed".into()
            }
        );
        assert_eq!(reason_for(-77, REASONS), "refused with code -77");
    }

    #[test]
    fn missing_result_code_is_unexpected() {
        let req = CallRequest::builder("BO_X", "WRITE")
            .output(RESULT_PARAM, SqlType::Integer)
            .build()
            .unwrap();
        let mut outputs = Outputs::new();
        outputs.insert(RESULT_PARAM.into(), Value::Null);
        assert!(matches!(
            outcome_of(&req, &outputs, REASONS),
            Err(ServiceError::UnexpectedResult { .. })
        ));

        outputs.insert(RESULT_PARAM.into(), Value::Integer(0));
        assert!(created_of(&req, &outputs, REASONS).is_err());
        assert_eq!(outcome_of(&req, &outputs, REASONS).unwrap(), Outcome::Completed(0));
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(Outcome::Completed(5_i64)).unwrap();
        assert_eq!(json, serde_json::json!({"status": "completed", "value": 5}));
        let json = serde_json::to_value(Outcome::<()>::Rejected {
            code: -1,
            reason: "not found".into(),
        })
        .unwrap();
        assert_eq!(json["status"], "rejected");
        assert_eq!(json["value"]["code"], -1);
    }
}
