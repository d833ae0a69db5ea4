//! # bo-engine — Stored-Procedure Invocation Engine
//!
//! Executes a described routine call against a pooled connection and hands
//! back a uniform in-memory result, whatever the routine's signature shape.
//!
//! | Variant | Method | Result |
//! |---------|--------|--------|
//! | Void procedure | [`ProcedureExecutor::call_void`] | `()` |
//! | Scalar function | [`ProcedureExecutor::call_scalar`] | [`Value`](bo_core::Value) (`Null` when the function returned null) |
//! | Procedure with outputs | [`ProcedureExecutor::call_with_outputs`] | [`Outputs`](bo_core::Outputs) |
//! | Cursor procedure | [`ProcedureExecutor::call_cursor`] | `Vec<T>` |
//! | Cursor procedure with outputs | [`ProcedureExecutor::call_cursor_with_outputs`], [`ProcedureExecutor::call_cursors`] | [`CursorResult`](bo_core::CursorResult), [`CursorSet`](bo_core::CursorSet) |
//!
//! The caller picks the variant; the engine never infers it. The engine is
//! policy-free: sentinel return codes come back untouched and nothing is
//! retried.
//!
//! ## Backends
//!
//! [`postgres::PgConnectionSource`] runs calls on PostgreSQL through `sqlx`.
//! Any [`ConnectionSource`](bo_core::ConnectionSource) works, which is how the
//! test suites run against `bo-stub`.

pub mod config;
pub mod executor;
pub mod postgres;

pub use config::{ConfigError, EngineConfig};
pub use executor::{ProcedureExecutor, DEFAULT_FETCH_SIZE};
pub use postgres::PgConnectionSource;

use std::sync::Arc;

/// Failure to bring the engine up.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The connection pool could not be created.
    #[error("database connection failed: {0}")]
    Connect(#[from] sqlx::Error),
}

/// Connect to PostgreSQL and build an executor from `config`.
pub async fn connect(config: &EngineConfig) -> Result<ProcedureExecutor, EngineError> {
    config.validate()?;
    let source = PgConnectionSource::connect(config).await?;
    Ok(ProcedureExecutor::new(Arc::new(source)).with_fetch_size(config.fetch_size))
}
