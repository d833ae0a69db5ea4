//! # Connection Backend Boundary
//!
//! The invocation engine never talks to a driver directly. It leases a
//! [`RoutineConnection`] from a [`ConnectionSource`] and walks it through
//! the fixed call sequence:
//!
//! ```text
//! acquire → bind* → register_output* → execute
//!         → (fetch+ → close_cursor)* → return_value | output*
//!         → finish → drop
//! ```
//!
//! The lease is an owned value. Dropping it hands the connection back to
//! its pool, which is how release is guaranteed on every exit path; a lease
//! dropped before [`RoutineConnection::finish`] abandons (rolls back) the
//! call.

use async_trait::async_trait;

use crate::error::DriverError;
use crate::param::{ParameterDescriptor, SqlType};
use crate::routine::RoutineName;
use crate::row::CursorRow;
use crate::value::Value;

/// How the routine is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallForm {
    /// A procedure; results come back through output parameters.
    Procedure,
    /// A function returning a single value of the given type.
    Function {
        /// Declared return type.
        returns: SqlType,
    },
}

/// A pool of database connections.
#[async_trait]
pub trait ConnectionSource: Send + Sync {
    /// Lease one connection for the duration of one call.
    async fn acquire(&self) -> Result<Box<dyn RoutineConnection>, DriverError>;
}

/// One leased connection, positioned for a single routine call.
#[async_trait]
pub trait RoutineConnection: Send {
    /// Bind the next input argument. The value is converted to the
    /// descriptor's declared type; `Null` binds as a typed null.
    fn bind(&mut self, param: &ParameterDescriptor, value: &Value) -> Result<(), DriverError>;

    /// Register the next output argument.
    fn register_output(&mut self, param: &ParameterDescriptor) -> Result<(), DriverError>;

    /// Execute the routine with everything bound and registered so far.
    async fn execute(&mut self, routine: &RoutineName, form: CallForm) -> Result<(), DriverError>;

    /// Fetch up to `max_rows` rows from the named cursor output.
    ///
    /// A batch shorter than `max_rows` means the cursor is exhausted.
    async fn fetch(&mut self, cursor: &str, max_rows: usize) -> Result<Vec<CursorRow>, DriverError>;

    /// Close the named cursor output. Closing an exhausted or never-opened
    /// cursor is not an error.
    async fn close_cursor(&mut self, cursor: &str) -> Result<(), DriverError>;

    /// The function result after a [`CallForm::Function`] execution.
    fn return_value(&mut self) -> Result<Value, DriverError>;

    /// The value of a registered scalar output after execution.
    fn output(&mut self, name: &str) -> Result<Value, DriverError>;

    /// Complete the call (commit). The lease is dropped afterwards.
    async fn finish(&mut self) -> Result<(), DriverError>;
}
