//! `BO_FAX`: outbound fax gateway.

use bo_core::{CallRequest, SqlType};
use bo_engine::ProcedureExecutor;
use serde::{Deserialize, Serialize};

use crate::delivery::{self, DeliveryRecord, DeliveryStatus};
use crate::error::ServiceError;
use crate::outcome::{created_of, Outcome, ReasonTable, RESULT_PARAM};
use crate::retry::retry_read;

const PACKAGE: &str = "BO_FAX";

/// Refusal codes of `BO_FAX.QUEUE`.
pub const REASONS: ReasonTable = &[
    (-1, "fax number is invalid"),
    (-2, "document not found"),
    (-3, "document is too large to fax"),
];

/// A fax to queue: a stored document sent to a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaxRequest {
    pub recipient_number: String,
    pub document_id: i64,
    pub cover_note: Option<String>,
}

/// Fax operations.
#[derive(Debug, Clone)]
pub struct FaxService {
    exec: ProcedureExecutor,
}

impl FaxService {
    pub fn new(exec: ProcedureExecutor) -> Self {
        Self { exec }
    }

    /// Queue a fax. Completes with the fax id.
    pub async fn queue(&self, fax: &FaxRequest) -> Result<Outcome<i64>, ServiceError> {
        let req = CallRequest::builder(PACKAGE, "QUEUE")
            .input("P_RECIPIENT", SqlType::Varchar, fax.recipient_number.as_str())
            .input("P_DOCUMENT_ID", SqlType::Integer, fax.document_id)
            .input("P_COVER_NOTE", SqlType::Clob, fax.cover_note.clone())
            .output(RESULT_PARAM, SqlType::Integer)
            .build()?;
        let outputs = self.exec.call_with_outputs(&req).await?;
        created_of(&req, &outputs, REASONS)
    }

    pub async fn status(&self, fax_id: i64) -> Result<Option<DeliveryStatus>, ServiceError> {
        delivery::lookup_status(&self.exec, PACKAGE, "STATUS", fax_id).await
    }

    /// Faxes sent to `recipient_number`.
    pub async fn history(&self, recipient_number: &str) -> Result<Vec<DeliveryRecord>, ServiceError> {
        let req = CallRequest::builder(PACKAGE, "HISTORY")
            .input("P_RECIPIENT", SqlType::Varchar, recipient_number)
            .cursor("P_CURSOR")
            .build()?;
        Ok(retry_read(|| {
            self.exec
                .call_cursor::<DeliveryRecord>(&req, &delivery::record_from_row)
        })
        .await?)
    }
}
