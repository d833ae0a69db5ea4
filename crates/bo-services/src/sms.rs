//! `BO_SMS`: outbound SMS gateway.

use bo_core::{CallRequest, SqlType};
use bo_engine::ProcedureExecutor;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::delivery::{self, DeliveryRecord, DeliveryStatus};
use crate::error::ServiceError;
use crate::outcome::{created_of, Outcome, ReasonTable, RESULT_PARAM};
use crate::retry::retry_read;

const PACKAGE: &str = "BO_SMS";

/// Refusal codes of `BO_SMS.QUEUE`.
pub const REASONS: ReasonTable = &[
    (-1, "recipient number is invalid"),
    (-2, "message exceeds the maximum length"),
    (-3, "recipient has opted out"),
    (-4, "sender id is not registered"),
];

/// An SMS to queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsRequest {
    pub recipient: String,
    pub body: String,
    pub sender_id: Option<String>,
}

/// SMS operations.
#[derive(Debug, Clone)]
pub struct SmsService {
    exec: ProcedureExecutor,
}

impl SmsService {
    pub fn new(exec: ProcedureExecutor) -> Self {
        Self { exec }
    }

    /// Queue an SMS for delivery. Completes with the SMS id.
    pub async fn queue(&self, sms: &SmsRequest) -> Result<Outcome<i64>, ServiceError> {
        let req = CallRequest::builder(PACKAGE, "QUEUE")
            .input("P_RECIPIENT", SqlType::Varchar, sms.recipient.as_str())
            .input("P_BODY", SqlType::Varchar, sms.body.as_str())
            .input("P_SENDER_ID", SqlType::Varchar, sms.sender_id.clone())
            .output(RESULT_PARAM, SqlType::Integer)
            .build()?;
        let outputs = self.exec.call_with_outputs(&req).await?;
        created_of(&req, &outputs, REASONS)
    }

    pub async fn delivery_status(&self, sms_id: i64) -> Result<Option<DeliveryStatus>, ServiceError> {
        delivery::lookup_status(&self.exec, PACKAGE, "DELIVERY_STATUS", sms_id).await
    }

    /// Messages sent to `recipient`, optionally only those queued on or after `since`.
    pub async fn history(
        &self,
        recipient: &str,
        since: Option<NaiveDate>,
    ) -> Result<Vec<DeliveryRecord>, ServiceError> {
        let req = CallRequest::builder(PACKAGE, "HISTORY")
            .input("P_RECIPIENT", SqlType::Varchar, recipient)
            .input("P_SINCE", SqlType::Date, since)
            .cursor("P_CURSOR")
            .build()?;
        Ok(retry_read(|| {
            self.exec
                .call_cursor::<DeliveryRecord>(&req, &delivery::record_from_row)
        })
        .await?)
    }
}
