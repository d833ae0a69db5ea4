//! Executor construction for the selected backend.

use std::sync::Arc;

use anyhow::{Context, Result};
use bo_engine::{EngineConfig, ProcedureExecutor};

/// Build an executor: the demo stub database, or PostgreSQL configured from
/// the environment.
pub async fn executor(stub: bool) -> Result<ProcedureExecutor> {
    if stub {
        tracing::info!("using built-in demo database");
        return Ok(ProcedureExecutor::new(Arc::new(crate::demo::database())));
    }
    let config = EngineConfig::from_env().context("loading database configuration")?;
    tracing::debug!(?config, "connecting");
    bo_engine::connect(&config)
        .await
        .context("connecting to the database")
}
