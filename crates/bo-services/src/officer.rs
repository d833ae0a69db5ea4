//! `BO_OFFICER`: back-office staff accounts.

use bo_core::{CallRequest, CursorRow, DriverError, SqlType};
use bo_engine::ProcedureExecutor;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::fields;
use crate::outcome::{created_of, outcome_of, Outcome, ReasonTable, RESULT_PARAM};
use crate::retry::retry_read;

const PACKAGE: &str = "BO_OFFICER";

/// Refusal codes of `BO_OFFICER` write routines.
pub const REASONS: ReasonTable = &[
    (-1, "officer not found"),
    (-2, "username is already taken"),
    (-3, "officer is already inactive"),
    (-4, "role does not exist"),
];

/// A back-office officer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Officer {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub active: bool,
    pub role: Option<String>,
}

/// An officer account to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOfficer {
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
}

fn officer_from_row(row: &CursorRow) -> Result<Officer, DriverError> {
    Ok(Officer {
        id: fields::integer(row, "OFFICER_ID")?,
        username: fields::text(row, "USERNAME")?,
        full_name: fields::text(row, "FULL_NAME")?,
        email: fields::opt_text(row, "EMAIL")?,
        active: fields::flag(row, "ACTIVE")?,
        role: fields::opt_text(row, "ROLE_NAME")?,
    })
}

/// Officer operations.
#[derive(Debug, Clone)]
pub struct OfficerService {
    exec: ProcedureExecutor,
}

impl OfficerService {
    pub fn new(exec: ProcedureExecutor) -> Self {
        Self { exec }
    }

    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Officer>, ServiceError> {
        let req = CallRequest::builder(PACKAGE, "LIST")
            .input("P_INCLUDE_INACTIVE", SqlType::Flag, include_inactive)
            .cursor("P_CURSOR")
            .build()?;
        Ok(retry_read(|| self.exec.call_cursor::<Officer>(&req, &officer_from_row)).await?)
    }

    /// Officer by username (case-insensitive in the routine).
    pub async fn find(&self, username: &str) -> Result<Option<Officer>, ServiceError> {
        let req = CallRequest::builder(PACKAGE, "FIND")
            .input("P_USERNAME", SqlType::Varchar, username)
            .cursor("P_CURSOR")
            .build()?;
        let rows = retry_read(|| self.exec.call_cursor::<Officer>(&req, &officer_from_row)).await?;
        Ok(rows.into_iter().next())
    }

    /// Create an account. Completes with the officer id.
    pub async fn create(&self, officer: &NewOfficer) -> Result<Outcome<i64>, ServiceError> {
        let req = CallRequest::builder(PACKAGE, "CREATE")
            .input("P_USERNAME", SqlType::Varchar, officer.username.as_str())
            .input("P_FULL_NAME", SqlType::Varchar, officer.full_name.as_str())
            .input("P_EMAIL", SqlType::Varchar, officer.email.clone())
            .output(RESULT_PARAM, SqlType::Integer)
            .build()?;
        let outputs = self.exec.call_with_outputs(&req).await?;
        created_of(&req, &outputs, REASONS)
    }

    pub async fn deactivate(&self, officer_id: i64) -> Result<Outcome<()>, ServiceError> {
        let req = CallRequest::builder(PACKAGE, "DEACTIVATE")
            .input("P_OFFICER_ID", SqlType::Integer, officer_id)
            .output(RESULT_PARAM, SqlType::Integer)
            .build()?;
        let outputs = self.exec.call_with_outputs(&req).await?;
        Ok(outcome_of(&req, &outputs, REASONS)?.map(|_| ()))
    }

    /// Grant `role`. Permission sets cached for the officer are not refreshed
    /// until they expire or are invalidated.
    pub async fn assign_role(&self, officer_id: i64, role: &str) -> Result<Outcome<()>, ServiceError> {
        let req = CallRequest::builder(PACKAGE, "ASSIGN_ROLE")
            .input("P_OFFICER_ID", SqlType::Integer, officer_id)
            .input("P_ROLE_NAME", SqlType::Varchar, role)
            .output(RESULT_PARAM, SqlType::Integer)
            .build()?;
        let outputs = self.exec.call_with_outputs(&req).await?;
        Ok(outcome_of(&req, &outputs, REASONS)?.map(|_| ()))
    }
}
