//! `BO_CUSTOMER`: customer master data.

use bo_core::{CallRequest, CursorRow, DriverError, SqlType, Value};
use bo_engine::ProcedureExecutor;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::fields;
use crate::outcome::{created_of, outcome_of, Outcome, ReasonTable, RESULT_PARAM};
use crate::retry::retry_read;

const PACKAGE: &str = "BO_CUSTOMER";

/// Refusal codes of `BO_CUSTOMER` write routines.
pub const REASONS: ReasonTable = &[
    (-1, "customer not found"),
    (-2, "a customer with this tax number already exists"),
    (-3, "customer is archived"),
    (-4, "contact details are invalid"),
];

/// A customer record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub tax_number: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: String,
    pub created_at: NaiveDateTime,
}

/// Search filters. Unset filters match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSearch {
    pub name: Option<String>,
    pub tax_number: Option<String>,
    pub status: Option<String>,
}

/// Data for a new customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub tax_number: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Replacement contact details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactUpdate {
    pub email: Option<String>,
    pub phone: Option<String>,
}

pub(crate) fn customer_from_row(row: &CursorRow) -> Result<Customer, DriverError> {
    Ok(Customer {
        id: fields::integer(row, "CUSTOMER_ID")?,
        name: fields::text(row, "NAME")?,
        tax_number: fields::opt_text(row, "TAX_NUMBER")?,
        email: fields::opt_text(row, "EMAIL")?,
        phone: fields::opt_text(row, "PHONE")?,
        status: fields::text(row, "STATUS")?,
        created_at: fields::timestamp(row, "CREATED_AT")?,
    })
}

/// Customer operations.
#[derive(Debug, Clone)]
pub struct CustomerService {
    exec: ProcedureExecutor,
}

impl CustomerService {
    pub fn new(exec: ProcedureExecutor) -> Self {
        Self { exec }
    }

    /// Customer by id.
    pub async fn find(&self, customer_id: i64) -> Result<Option<Customer>, ServiceError> {
        let req = CallRequest::builder(PACKAGE, "FIND")
            .input("P_CUSTOMER_ID", SqlType::Integer, customer_id)
            .cursor("P_CURSOR")
            .build()?;
        let rows =
            retry_read(|| self.exec.call_cursor::<Customer>(&req, &customer_from_row)).await?;
        Ok(rows.into_iter().next())
    }

    /// Customers matching every set filter.
    pub async fn search(&self, criteria: &CustomerSearch) -> Result<Vec<Customer>, ServiceError> {
        let req = CallRequest::builder(PACKAGE, "SEARCH")
            .input("P_NAME", SqlType::Varchar, criteria.name.clone())
            .input("P_TAX_NUMBER", SqlType::Varchar, criteria.tax_number.clone())
            .input("P_STATUS", SqlType::Varchar, criteria.status.clone())
            .cursor("P_CURSOR")
            .build()?;
        Ok(retry_read(|| self.exec.call_cursor::<Customer>(&req, &customer_from_row)).await?)
    }

    /// Register a customer. Completes with the new customer id.
    pub async fn create(&self, customer: &NewCustomer) -> Result<Outcome<i64>, ServiceError> {
        let req = CallRequest::builder(PACKAGE, "CREATE")
            .input("P_NAME", SqlType::Varchar, customer.name.as_str())
            .input("P_TAX_NUMBER", SqlType::Varchar, customer.tax_number.clone())
            .input("P_EMAIL", SqlType::Varchar, customer.email.clone())
            .input("P_PHONE", SqlType::Varchar, customer.phone.clone())
            .output(RESULT_PARAM, SqlType::Integer)
            .build()?;
        let outputs = self.exec.call_with_outputs(&req).await?;
        created_of(&req, &outputs, REASONS)
    }

    /// Replace a customer's contact details.
    pub async fn update_contact(
        &self,
        customer_id: i64,
        contact: &ContactUpdate,
    ) -> Result<Outcome<()>, ServiceError> {
        let req = CallRequest::builder(PACKAGE, "UPDATE_CONTACT")
            .input("P_CUSTOMER_ID", SqlType::Integer, customer_id)
            .input("P_EMAIL", SqlType::Varchar, contact.email.clone())
            .input("P_PHONE", SqlType::Varchar, contact.phone.clone())
            .output(RESULT_PARAM, SqlType::Integer)
            .build()?;
        let outputs = self.exec.call_with_outputs(&req).await?;
        Ok(outcome_of(&req, &outputs, REASONS)?.map(|_| ()))
    }

    /// Current status code, `None` for an unknown customer.
    pub async fn status(&self, customer_id: i64) -> Result<Option<String>, ServiceError> {
        let req = CallRequest::builder(PACKAGE, "GET_STATUS")
            .input("P_CUSTOMER_ID", SqlType::Integer, customer_id)
            .returns(SqlType::Varchar)
            .build()?;
        let value = retry_read(|| self.exec.call_scalar(&req)).await?;
        match value {
            Value::Null => Ok(None),
            Value::Text(status) => Ok(Some(status)),
            other => Err(ServiceError::unexpected(
                req.routine(),
                format!("status is {}", other.kind()),
            )),
        }
    }
}
