//! `BO_DOCUMENT`: customer document intake and review.

use bo_core::{CallRequest, CursorRow, DriverError, SqlType, Value};
use bo_engine::ProcedureExecutor;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::fields;
use crate::outcome::{created_of, outcome_of, Outcome, ReasonTable, RESULT_PARAM};
use crate::retry::retry_read;

const PACKAGE: &str = "BO_DOCUMENT";

/// Refusal codes of `BO_DOCUMENT` write routines.
pub const REASONS: ReasonTable = &[
    (-1, "document not found"),
    (-2, "customer not found"),
    (-3, "document type is not accepted"),
    (-4, "document has already been reviewed"),
    (-5, "document content is empty"),
];

/// Document metadata as listed for a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: i64,
    pub customer_id: i64,
    pub kind: String,
    pub file_name: String,
    pub status: String,
    pub submitted_at: Option<NaiveDateTime>,
    pub reviewed_by: Option<String>,
}

/// A document to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub customer_id: i64,
    pub kind: String,
    pub file_name: String,
    pub content: Vec<u8>,
}

fn summary_from_row(row: &CursorRow) -> Result<DocumentSummary, DriverError> {
    Ok(DocumentSummary {
        id: fields::integer(row, "DOCUMENT_ID")?,
        customer_id: fields::integer(row, "CUSTOMER_ID")?,
        kind: fields::text(row, "DOCUMENT_TYPE")?,
        file_name: fields::text(row, "FILE_NAME")?,
        status: fields::text(row, "STATUS")?,
        submitted_at: fields::opt_timestamp(row, "SUBMITTED_AT")?,
        reviewed_by: fields::opt_text(row, "REVIEWED_BY")?,
    })
}

/// Document operations.
#[derive(Debug, Clone)]
pub struct DocumentService {
    exec: ProcedureExecutor,
}

impl DocumentService {
    pub fn new(exec: ProcedureExecutor) -> Self {
        Self { exec }
    }

    /// Documents on file for a customer.
    pub async fn list_for_customer(
        &self,
        customer_id: i64,
    ) -> Result<Vec<DocumentSummary>, ServiceError> {
        let req = CallRequest::builder(PACKAGE, "LIST_FOR_CUSTOMER")
            .input("P_CUSTOMER_ID", SqlType::Integer, customer_id)
            .cursor("P_CURSOR")
            .build()?;
        Ok(retry_read(|| {
            self.exec
                .call_cursor::<DocumentSummary>(&req, &summary_from_row)
        })
        .await?)
    }

    /// Submit a document for review. Completes with the document id.
    pub async fn submit(&self, document: &NewDocument) -> Result<Outcome<i64>, ServiceError> {
        let req = CallRequest::builder(PACKAGE, "SUBMIT")
            .input("P_CUSTOMER_ID", SqlType::Integer, document.customer_id)
            .input("P_DOCUMENT_TYPE", SqlType::Varchar, document.kind.as_str())
            .input("P_FILE_NAME", SqlType::Varchar, document.file_name.as_str())
            .input("P_CONTENT", SqlType::Blob, document.content.clone())
            .output(RESULT_PARAM, SqlType::Integer)
            .build()?;
        let outputs = self.exec.call_with_outputs(&req).await?;
        created_of(&req, &outputs, REASONS)
    }

    pub async fn approve(&self, document_id: i64, officer: &str) -> Result<Outcome<()>, ServiceError> {
        self.review("APPROVE", document_id, officer, None).await
    }

    pub async fn reject(
        &self,
        document_id: i64,
        officer: &str,
        reason: &str,
    ) -> Result<Outcome<()>, ServiceError> {
        self.review("REJECT", document_id, officer, Some(reason)).await
    }

    async fn review(
        &self,
        procedure: &str,
        document_id: i64,
        officer: &str,
        reason: Option<&str>,
    ) -> Result<Outcome<()>, ServiceError> {
        let mut builder = CallRequest::builder(PACKAGE, procedure)
            .input("P_DOCUMENT_ID", SqlType::Integer, document_id)
            .input("P_OFFICER", SqlType::Varchar, officer);
        if let Some(reason) = reason {
            builder = builder.input("P_REASON", SqlType::Varchar, reason);
        }
        let req = builder.output(RESULT_PARAM, SqlType::Integer).build()?;
        let outputs = self.exec.call_with_outputs(&req).await?;
        Ok(outcome_of(&req, &outputs, REASONS)?.map(|_| ()))
    }

    /// Stored file content, `None` when the document has none.
    pub async fn content(&self, document_id: i64) -> Result<Option<Vec<u8>>, ServiceError> {
        let req = CallRequest::builder(PACKAGE, "GET_CONTENT")
            .input("P_DOCUMENT_ID", SqlType::Integer, document_id)
            .returns(SqlType::Blob)
            .build()?;
        match retry_read(|| self.exec.call_scalar(&req)).await? {
            Value::Null => Ok(None),
            Value::Blob(bytes) => Ok(Some(bytes)),
            other => Err(ServiceError::unexpected(
                req.routine(),
                format!("content is {}", other.kind()),
            )),
        }
    }
}
