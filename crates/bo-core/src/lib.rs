#![deny(missing_docs)]

//! # bo-core — Foundational Types for the Back-Office Procedure Gateway
//!
//! Every business operation in the back office is a call to a routine that
//! lives inside a database package. This crate defines the vocabulary those
//! calls are described in, independent of any particular database driver:
//!
//! 1. **[`ParameterDescriptor`]**: name, direction and declared [`SqlType`]
//!    of one call argument. Declared type, not value type, drives binding.
//!
//! 2. **[`CallRequest`]**: an immutable description of one call, built per
//!    call site with [`CallRequest::builder`] and validated at build time.
//!
//! 3. **[`CursorRow`] / [`Row`] / [`RowMapper`]**: positional cursor rows as
//!    the database exposes them, and the mapping into application records.
//!
//! 4. **[`DomainError`]**: the only error type that crosses the engine
//!    boundary. Carries the package, procedure and database error code.
//!
//! 5. **[`ConnectionSource`] / [`RoutineConnection`]**: the seam between
//!    the invocation engine and a concrete connection pool.

pub mod backend;
pub mod error;
pub mod param;
pub mod request;
pub mod result;
pub mod routine;
pub mod row;
pub mod value;

// Re-export primary types at crate root for ergonomic imports.
pub use backend::{CallForm, ConnectionSource, RoutineConnection};
pub use error::{DomainError, DriverError, ErrorKind};
pub use param::{Direction, ParameterDescriptor, SqlType};
pub use request::{CallRequest, CallRequestBuilder};
pub use result::{CursorResult, CursorSet, Outputs};
pub use routine::{InvalidIdentifier, RoutineName};
pub use row::{Column, ColumnMapper, CursorRow, Row, RowMapper};
pub use value::{CoercionError, Value};
