//! # bo-cli — Back-Office Gateway Command Line
//!
//! Provides the `bo` binary, a thin shell over the invocation engine for
//! operators and for smoke-testing routines:
//!
//! ```bash
//! # Scalar function
//! bo call BO_CUSTOMER.GET_STATUS --in P_CUSTOMER_ID:INTEGER=7 --returns VARCHAR
//!
//! # Cursor procedure
//! bo call BO_CUSTOMER.FIND --in P_CUSTOMER_ID:INTEGER=7 --cursor P_CURSOR
//!
//! # Permission set of a principal, and a single check
//! bo permissions user1
//! bo permissions user1 --check BO_CUSTOMER.CREATE
//!
//! # Same commands against the built-in demo database
//! bo --stub call BO_CUSTOMER.FIND --in P_CUSTOMER_ID:INTEGER=7 --cursor P_CURSOR
//! ```
//!
//! Results are printed as JSON on stdout. Handlers return the process exit
//! code; see [`exit_code`] for how call failures map onto it.

pub mod backend;
pub mod call;
pub mod demo;
pub mod permissions;

use bo_core::{DomainError, ErrorKind};

/// Process exit code for a failed routine call.
///
/// | Code | Failure |
/// |------|---------|
/// | 2 | the routine raised a business error |
/// | 3 | connectivity or driver failure |
/// | 4 | the call description was invalid |
pub fn exit_code(err: &DomainError) -> u8 {
    match err.kind {
        ErrorKind::Business => 2,
        ErrorKind::Connectivity => 3,
        ErrorKind::InvalidCall => 4,
    }
}
