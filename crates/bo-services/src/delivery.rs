//! Delivery tracking shared by the SMS and fax gateways.

use bo_core::{CallRequest, CursorRow, DriverError, Outputs, SqlType};
use bo_engine::ProcedureExecutor;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::fields;
use crate::retry::retry_read;

/// Where an outbound message stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStatus {
    pub status: String,
    pub delivered_at: Option<NaiveDateTime>,
    pub error: Option<String>,
}

/// One sent (or attempted) outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: i64,
    pub recipient: String,
    pub status: String,
    pub queued_at: NaiveDateTime,
    pub delivered_at: Option<NaiveDateTime>,
}

pub(crate) fn record_from_row(row: &CursorRow) -> Result<DeliveryRecord, DriverError> {
    Ok(DeliveryRecord {
        id: fields::integer(row, "ID")?,
        recipient: fields::text(row, "RECIPIENT")?,
        status: fields::text(row, "STATUS")?,
        queued_at: fields::timestamp(row, "QUEUED_AT")?,
        delivered_at: fields::opt_timestamp(row, "DELIVERED_AT")?,
    })
}

/// Call `package.procedure(P_ID, P_STATUS out, P_DELIVERED_AT out, P_ERROR out)`.
///
/// A null status means the routine does not know the id.
pub(crate) async fn lookup_status(
    exec: &ProcedureExecutor,
    package: &str,
    procedure: &str,
    id: i64,
) -> Result<Option<DeliveryStatus>, ServiceError> {
    let req = CallRequest::builder(package, procedure)
        .input("P_ID", SqlType::Integer, id)
        .output("P_STATUS", SqlType::Varchar)
        .output("P_DELIVERED_AT", SqlType::Timestamp)
        .output("P_ERROR", SqlType::Varchar)
        .build()?;
    let outputs = retry_read(|| exec.call_with_outputs(&req)).await?;
    status_from_outputs(&req, &outputs)
}

fn status_from_outputs(
    req: &CallRequest,
    outputs: &Outputs,
) -> Result<Option<DeliveryStatus>, ServiceError> {
    let Some(status) = fields::output(outputs, "P_STATUS") else {
        return Ok(None);
    };
    let status = status
        .as_str()
        .ok_or_else(|| ServiceError::unexpected(req.routine(), "P_STATUS is not text"))?;
    Ok(Some(DeliveryStatus {
        status: status.to_string(),
        delivered_at: fields::output(outputs, "P_DELIVERED_AT").and_then(|v| v.as_timestamp()),
        error: fields::output(outputs, "P_ERROR")
            .and_then(|v| v.as_str())
            .map(str::to_owned),
    }))
}
