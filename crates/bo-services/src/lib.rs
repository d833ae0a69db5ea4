//! # bo-services — Back-Office Domain Services
//!
//! Typed operations over the database packages that hold the back office's
//! business logic. Each service owns one package, builds its call requests,
//! picks the invocation variant, and reshapes cursor rows into records:
//!
//! | Service | Package |
//! |---------|---------|
//! | [`CustomerService`] | `BO_CUSTOMER` |
//! | [`PaymentService`] | `BO_PAYMENT` |
//! | [`DocumentService`] | `BO_DOCUMENT` |
//! | [`MessagingService`] | `BO_MESSAGE` |
//! | [`SmsService`] | `BO_SMS` |
//! | [`FaxService`] | `BO_FAX` |
//! | [`LicenseService`] | `BO_LICENSE` |
//! | [`OfficerService`] | `BO_OFFICER` |
//!
//! ## Policy
//!
//! The engine underneath is policy-free. The two policies live here:
//!
//! - Write routines report through a `P_RESULT` code, interpreted into an
//!   [`Outcome`] (see [`outcome`]).
//! - Reads are retried on connectivity failures; writes never are, since a
//!   lost acknowledgement does not mean the write did not happen.

pub mod customer;
pub mod delivery;
pub mod document;
pub mod error;
pub mod fax;
mod fields;
pub mod license;
pub mod messaging;
pub mod officer;
pub mod outcome;
pub mod payment;
mod retry;
pub mod sms;

pub use customer::{ContactUpdate, Customer, CustomerSearch, CustomerService, NewCustomer};
pub use delivery::{DeliveryRecord, DeliveryStatus};
pub use document::{DocumentService, DocumentSummary, NewDocument};
pub use error::ServiceError;
pub use fax::{FaxRequest, FaxService};
pub use license::{License, LicenseService, NewLicense};
pub use messaging::{Message, MessagingService, NewMessage};
pub use officer::{NewOfficer, Officer, OfficerService};
pub use outcome::Outcome;
pub use payment::{Page, Payment, PaymentSearch, PaymentService, Statement, StatementLine};
pub use sms::{SmsRequest, SmsService};

use bo_engine::{EngineConfig, EngineError, ProcedureExecutor};

/// Every domain service over one shared executor.
#[derive(Debug, Clone)]
pub struct BackOffice {
    exec: ProcedureExecutor,
}

impl BackOffice {
    pub fn new(exec: ProcedureExecutor) -> Self {
        Self { exec }
    }

    /// Connect to the database described by `config`.
    pub async fn connect(config: &EngineConfig) -> Result<Self, EngineError> {
        Ok(Self::new(bo_engine::connect(config).await?))
    }

    pub fn executor(&self) -> &ProcedureExecutor {
        &self.exec
    }

    pub fn customer(&self) -> CustomerService {
        CustomerService::new(self.exec.clone())
    }

    pub fn payment(&self) -> PaymentService {
        PaymentService::new(self.exec.clone())
    }

    pub fn document(&self) -> DocumentService {
        DocumentService::new(self.exec.clone())
    }

    pub fn messaging(&self) -> MessagingService {
        MessagingService::new(self.exec.clone())
    }

    pub fn sms(&self) -> SmsService {
        SmsService::new(self.exec.clone())
    }

    pub fn fax(&self) -> FaxService {
        FaxService::new(self.exec.clone())
    }

    pub fn license(&self) -> LicenseService {
        LicenseService::new(self.exec.clone())
    }

    pub fn officer(&self) -> OfficerService {
        OfficerService::new(self.exec.clone())
    }
}
