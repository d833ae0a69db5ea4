//! `BO_PAYMENT`: payments, statements and cancellations.

use bo_core::{CallRequest, CursorRow, DriverError, SqlType};
use bo_engine::ProcedureExecutor;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::fields;
use crate::outcome::{outcome_of, Outcome, ReasonTable, RESULT_PARAM};
use crate::retry::retry_read;

const PACKAGE: &str = "BO_PAYMENT";
const TOTAL_PARAM: &str = "P_TOTAL_COUNT";

/// Refusal codes of `BO_PAYMENT` write routines.
pub const REASONS: ReasonTable = &[
    (-1, "payment not found"),
    (-2, "payment is already settled"),
    (-3, "payment is already cancelled"),
    (-4, "cancellation window has passed"),
];

/// A payment record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub reference: String,
    pub customer_id: i64,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub created_at: NaiveDateTime,
}

/// Search filters and paging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSearch {
    pub customer_id: Option<i64>,
    pub status: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// One-based page number.
    pub page: i64,
    pub page_size: i64,
}

impl Default for PaymentSearch {
    fn default() -> Self {
        Self {
            customer_id: None,
            status: None,
            from: None,
            to: None,
            page: 1,
            page_size: 50,
        }
    }
}

/// One page of results with the total match count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

/// A booked line on a customer statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementLine {
    pub booked_on: NaiveDate,
    pub description: String,
    pub amount: Decimal,
}

/// Payments and fees of a customer over a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub payments: Vec<StatementLine>,
    pub fees: Vec<StatementLine>,
    /// Payment count as reported by the routine.
    pub total_count: i64,
}

pub(crate) fn payment_from_row(row: &CursorRow) -> Result<Payment, DriverError> {
    Ok(Payment {
        id: fields::integer(row, "PAYMENT_ID")?,
        reference: fields::text(row, "REFERENCE")?,
        customer_id: fields::integer(row, "CUSTOMER_ID")?,
        amount: fields::decimal(row, "AMOUNT")?,
        currency: fields::text(row, "CURRENCY")?,
        status: fields::text(row, "STATUS")?,
        created_at: fields::timestamp(row, "CREATED_AT")?,
    })
}

fn statement_line_from_row(row: &CursorRow) -> Result<StatementLine, DriverError> {
    Ok(StatementLine {
        booked_on: fields::date(row, "BOOKED_ON")?,
        description: fields::text(row, "DESCRIPTION")?,
        amount: fields::decimal(row, "AMOUNT")?,
    })
}

fn total_of(req: &CallRequest, outputs: &bo_core::Outputs) -> Result<i64, ServiceError> {
    let value = fields::required_output(req.routine(), outputs, TOTAL_PARAM)?;
    value.as_i64().ok_or_else(|| {
        ServiceError::unexpected(req.routine(), format!("{TOTAL_PARAM} is not an integer"))
    })
}

/// Payment operations.
#[derive(Debug, Clone)]
pub struct PaymentService {
    exec: ProcedureExecutor,
}

impl PaymentService {
    pub fn new(exec: ProcedureExecutor) -> Self {
        Self { exec }
    }

    /// One page of matching payments, newest first.
    pub async fn search(&self, criteria: &PaymentSearch) -> Result<Page<Payment>, ServiceError> {
        let req = CallRequest::builder(PACKAGE, "SEARCH")
            .input("P_CUSTOMER_ID", SqlType::Integer, criteria.customer_id)
            .input("P_STATUS", SqlType::Varchar, criteria.status.clone())
            .input("P_FROM", SqlType::Date, criteria.from)
            .input("P_TO", SqlType::Date, criteria.to)
            .input("P_PAGE", SqlType::Integer, criteria.page.max(1))
            .input("P_PAGE_SIZE", SqlType::Integer, criteria.page_size.max(1))
            .output(TOTAL_PARAM, SqlType::Integer)
            .cursor("P_CURSOR")
            .build()?;
        let result = retry_read(|| {
            self.exec
                .call_cursor_with_outputs::<Payment>(&req, &payment_from_row)
        })
        .await?;
        let total = total_of(&req, &result.outputs)?;
        Ok(Page {
            items: result.rows,
            total,
        })
    }

    /// Payment by its external reference.
    pub async fn find_by_reference(&self, reference: &str) -> Result<Option<Payment>, ServiceError> {
        let req = CallRequest::builder(PACKAGE, "FIND_BY_REFERENCE")
            .input("P_REFERENCE", SqlType::Varchar, reference)
            .cursor("P_CURSOR")
            .build()?;
        let rows = retry_read(|| self.exec.call_cursor::<Payment>(&req, &payment_from_row)).await?;
        Ok(rows.into_iter().next())
    }

    /// Statement for `customer_id` between `from` and `to`, inclusive.
    pub async fn statement(
        &self,
        customer_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Statement, ServiceError> {
        let req = CallRequest::builder(PACKAGE, "STATEMENT")
            .input("P_CUSTOMER_ID", SqlType::Integer, customer_id)
            .input("P_FROM", SqlType::Date, from)
            .input("P_TO", SqlType::Date, to)
            .output(TOTAL_PARAM, SqlType::Integer)
            .cursor("P_PAYMENTS")
            .cursor("P_FEES")
            .build()?;
        let mut set = retry_read(|| {
            self.exec
                .call_cursors::<StatementLine>(&req, &statement_line_from_row)
        })
        .await?;
        let total_count = total_of(&req, set.outputs())?;
        let payments = set.take("P_PAYMENTS").map(|r| r.rows).unwrap_or_default();
        let fees = set.take("P_FEES").map(|r| r.rows).unwrap_or_default();
        Ok(Statement {
            payments,
            fees,
            total_count,
        })
    }

    /// Cancel a pending payment.
    pub async fn cancel(&self, payment_id: i64, reason: &str) -> Result<Outcome<()>, ServiceError> {
        let req = CallRequest::builder(PACKAGE, "CANCEL")
            .input("P_PAYMENT_ID", SqlType::Integer, payment_id)
            .input("P_REASON", SqlType::Varchar, reason)
            .output(RESULT_PARAM, SqlType::Integer)
            .build()?;
        let outputs = self.exec.call_with_outputs(&req).await?;
        Ok(outcome_of(&req, &outputs, REASONS)?.map(|_| ()))
    }
}
