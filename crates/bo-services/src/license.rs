//! `BO_LICENSE`: licenses held by customers.

use bo_core::{CallRequest, CursorRow, DriverError, SqlType};
use bo_engine::ProcedureExecutor;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::fields;
use crate::outcome::{created_of, outcome_of, Outcome, ReasonTable, RESULT_PARAM};
use crate::retry::retry_read;

const PACKAGE: &str = "BO_LICENSE";

/// Refusal codes of `BO_LICENSE` write routines.
pub const REASONS: ReasonTable = &[
    (-1, "license not found"),
    (-2, "customer not found"),
    (-3, "license type is not available"),
    (-4, "license is revoked"),
    (-5, "renewal period is out of range"),
];

/// A license record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub id: i64,
    pub customer_id: i64,
    pub license_type: String,
    pub number: String,
    pub issued_on: NaiveDate,
    pub expires_on: NaiveDate,
    pub status: String,
}

/// A license to issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLicense {
    pub customer_id: i64,
    pub license_type: String,
    pub valid_months: i64,
}

fn license_from_row(row: &CursorRow) -> Result<License, DriverError> {
    Ok(License {
        id: fields::integer(row, "LICENSE_ID")?,
        customer_id: fields::integer(row, "CUSTOMER_ID")?,
        license_type: fields::text(row, "LICENSE_TYPE")?,
        number: fields::text(row, "LICENSE_NUMBER")?,
        issued_on: fields::date(row, "ISSUED_ON")?,
        expires_on: fields::date(row, "EXPIRES_ON")?,
        status: fields::text(row, "STATUS")?,
    })
}

/// License operations.
#[derive(Debug, Clone)]
pub struct LicenseService {
    exec: ProcedureExecutor,
}

impl LicenseService {
    pub fn new(exec: ProcedureExecutor) -> Self {
        Self { exec }
    }

    pub async fn find(&self, license_id: i64) -> Result<Option<License>, ServiceError> {
        let req = CallRequest::builder(PACKAGE, "FIND")
            .input("P_LICENSE_ID", SqlType::Integer, license_id)
            .cursor("P_CURSOR")
            .build()?;
        let rows = retry_read(|| self.exec.call_cursor::<License>(&req, &license_from_row)).await?;
        Ok(rows.into_iter().next())
    }

    /// Issue a license. Completes with the license id.
    pub async fn issue(&self, license: &NewLicense) -> Result<Outcome<i64>, ServiceError> {
        let req = CallRequest::builder(PACKAGE, "ISSUE")
            .input("P_CUSTOMER_ID", SqlType::Integer, license.customer_id)
            .input("P_LICENSE_TYPE", SqlType::Varchar, license.license_type.as_str())
            .input("P_VALID_MONTHS", SqlType::Integer, license.valid_months)
            .output(RESULT_PARAM, SqlType::Integer)
            .build()?;
        let outputs = self.exec.call_with_outputs(&req).await?;
        created_of(&req, &outputs, REASONS)
    }

    /// Extend a license by `months`. Completes with the new expiry date.
    pub async fn renew(&self, license_id: i64, months: i64) -> Result<Outcome<NaiveDate>, ServiceError> {
        let req = CallRequest::builder(PACKAGE, "RENEW")
            .input("P_LICENSE_ID", SqlType::Integer, license_id)
            .input("P_MONTHS", SqlType::Integer, months)
            .output(RESULT_PARAM, SqlType::Integer)
            .output("P_NEW_EXPIRY", SqlType::Date)
            .build()?;
        let outputs = self.exec.call_with_outputs(&req).await?;
        match outcome_of(&req, &outputs, REASONS)? {
            Outcome::Completed(_) => {
                let expiry = fields::required_output(req.routine(), &outputs, "P_NEW_EXPIRY")?
                    .as_date()
                    .ok_or_else(|| {
                        ServiceError::unexpected(req.routine(), "P_NEW_EXPIRY is not a date")
                    })?;
                Ok(Outcome::Completed(expiry))
            }
            Outcome::Rejected { code, reason } => Ok(Outcome::Rejected { code, reason }),
        }
    }

    /// Revoke a license. The routine raises if the license cannot be revoked.
    pub async fn revoke(&self, license_id: i64, reason: &str) -> Result<(), ServiceError> {
        let req = CallRequest::builder(PACKAGE, "REVOKE")
            .input("P_LICENSE_ID", SqlType::Integer, license_id)
            .input("P_REASON", SqlType::Varchar, reason)
            .build()?;
        self.exec.call_void(&req).await?;
        tracing::info!(license_id, "license revoked");
        Ok(())
    }

    /// Active licenses expiring within `days` days.
    pub async fn expiring(&self, days: i64) -> Result<Vec<License>, ServiceError> {
        let req = CallRequest::builder(PACKAGE, "EXPIRING")
            .input("P_DAYS", SqlType::Integer, days)
            .cursor("P_CURSOR")
            .build()?;
        Ok(retry_read(|| self.exec.call_cursor::<License>(&req, &license_from_row)).await?)
    }
}
