//! `BO_MESSAGE`: internal back-office messages.

use bo_core::{CallRequest, CursorRow, DriverError, SqlType, Value};
use bo_engine::ProcedureExecutor;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::fields;
use crate::outcome::{created_of, Outcome, ReasonTable, RESULT_PARAM};
use crate::retry::retry_read;

const PACKAGE: &str = "BO_MESSAGE";

/// Refusal codes of `BO_MESSAGE` write routines.
pub const REASONS: ReasonTable = &[
    (-1, "recipient not found"),
    (-2, "message body is empty"),
    (-3, "recipient mailbox is closed"),
];

/// A message in a user's inbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub sent_at: NaiveDateTime,
    pub read: bool,
}

/// A message to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

fn message_from_row(row: &CursorRow) -> Result<Message, DriverError> {
    Ok(Message {
        id: fields::integer(row, "MESSAGE_ID")?,
        sender: fields::text(row, "SENDER")?,
        subject: fields::text(row, "SUBJECT")?,
        body: fields::text(row, "BODY")?,
        sent_at: fields::timestamp(row, "SENT_AT")?,
        read: fields::flag(row, "IS_READ")?,
    })
}

/// Messaging operations.
#[derive(Debug, Clone)]
pub struct MessagingService {
    exec: ProcedureExecutor,
}

impl MessagingService {
    pub fn new(exec: ProcedureExecutor) -> Self {
        Self { exec }
    }

    /// Messages addressed to `user`, newest first.
    pub async fn inbox(&self, user: &str) -> Result<Vec<Message>, ServiceError> {
        let req = CallRequest::builder(PACKAGE, "INBOX")
            .input("P_USER", SqlType::Varchar, user)
            .cursor("P_CURSOR")
            .build()?;
        Ok(retry_read(|| self.exec.call_cursor::<Message>(&req, &message_from_row)).await?)
    }

    /// Send a message. Completes with the message id.
    pub async fn send(&self, message: &NewMessage) -> Result<Outcome<i64>, ServiceError> {
        let req = CallRequest::builder(PACKAGE, "SEND")
            .input("P_SENDER", SqlType::Varchar, message.sender.as_str())
            .input("P_RECIPIENT", SqlType::Varchar, message.recipient.as_str())
            .input("P_SUBJECT", SqlType::Varchar, message.subject.as_str())
            .input("P_BODY", SqlType::Clob, message.body.as_str())
            .output(RESULT_PARAM, SqlType::Integer)
            .build()?;
        let outputs = self.exec.call_with_outputs(&req).await?;
        created_of(&req, &outputs, REASONS)
    }

    /// Mark a message read. Unknown messages raise in the routine.
    pub async fn mark_read(&self, message_id: i64, user: &str) -> Result<(), ServiceError> {
        let req = CallRequest::builder(PACKAGE, "MARK_READ")
            .input("P_MESSAGE_ID", SqlType::Integer, message_id)
            .input("P_USER", SqlType::Varchar, user)
            .build()?;
        self.exec.call_void(&req).await?;
        Ok(())
    }

    /// Unread message count; `None` when the routine does not know `user`.
    pub async fn unread_count(&self, user: &str) -> Result<Option<i64>, ServiceError> {
        let req = CallRequest::builder(PACKAGE, "UNREAD_COUNT")
            .input("P_USER", SqlType::Varchar, user)
            .returns(SqlType::Integer)
            .build()?;
        match retry_read(|| self.exec.call_scalar(&req)).await? {
            Value::Null => Ok(None),
            value => value.as_i64().map(Some).ok_or_else(|| {
                ServiceError::unexpected(req.routine(), format!("count is {}", value.kind()))
            }),
        }
    }
}
