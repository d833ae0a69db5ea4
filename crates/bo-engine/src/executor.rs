//! # Procedure Executor
//!
//! Every variant walks the same sequence on one leased connection:
//!
//! 1. lease a connection from the [`ConnectionSource`],
//! 2. bind inputs in declaration order, register outputs,
//! 3. execute,
//! 4. drain each requested cursor to exhaustion in `fetch_size` batches,
//!    mapping rows in cursor order, then close it,
//! 5. close cursors that were declared but not requested, undrained,
//! 6. read the return value or scalar outputs,
//! 7. finish the call and drop the lease.
//!
//! The lease is an owned value held on the stack of one async fn, so every
//! exit path (including `?` and cancellation of the future) drops it exactly
//! once. Any failure in steps 1-7 surfaces as a [`DomainError`] carrying the
//! package and procedure. No call is ever retried here.
//!
//! ## Shape checks
//!
//! The caller chooses the variant. A request whose shape contradicts the
//! chosen variant (say, a function result requested through
//! [`ProcedureExecutor::call_void`]) is refused as
//! [`ErrorKind::InvalidCall`](bo_core::ErrorKind::InvalidCall) before any
//! connection is leased.

use std::sync::Arc;
use std::time::Instant;

use bo_core::{
    CallForm, CallRequest, ColumnMapper, ConnectionSource, CursorResult, CursorSet, DomainError,
    DriverError, Outputs, Row, RowMapper, RoutineConnection, Value,
};
use tracing::Instrument;

/// Rows pulled per cursor round-trip unless configured otherwise.
pub const DEFAULT_FETCH_SIZE: usize = 500;

/// Runs described routine calls against leased connections.
///
/// Cheap to clone; clones share the connection source.
#[derive(Clone)]
pub struct ProcedureExecutor {
    source: Arc<dyn ConnectionSource>,
    fetch_size: usize,
}

impl std::fmt::Debug for ProcedureExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcedureExecutor")
            .field("fetch_size", &self.fetch_size)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variant {
    Void,
    Scalar,
    Outputs,
    Cursor,
    CursorWithOutputs,
    Cursors,
}

impl Variant {
    fn as_str(self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Scalar => "scalar",
            Self::Outputs => "outputs",
            Self::Cursor => "cursor",
            Self::CursorWithOutputs => "cursor_with_outputs",
            Self::Cursors => "cursors",
        }
    }

    /// Why `req` cannot run as this variant, if it cannot.
    fn mismatch(self, req: &CallRequest) -> Option<String> {
        let outputs = req.output_params().len();
        let cursors = req.cursor_names().len();
        let returns = req.returns().is_some();

        if returns && self != Self::Scalar {
            return Some(format!(
                "a function result was declared but the {} variant calls a procedure",
                self.as_str()
            ));
        }
        match self {
            Self::Void if outputs > 0 => {
                Some(format!("void call declares {outputs} output parameters"))
            }
            Self::Scalar if !returns => Some("scalar call without a declared return type".into()),
            Self::Scalar if outputs > 0 => {
                Some(format!("scalar call declares {outputs} output parameters"))
            }
            Self::Outputs if outputs == 0 => Some("no output parameters declared".into()),
            Self::Outputs if req.output_params().iter().any(|p| p.sql_type().is_cursor()) => {
                Some("cursor outputs require a cursor variant".into())
            }
            Self::Cursor if cursors != 1 || outputs != 1 => Some(format!(
                "cursor call needs exactly one cursor output and nothing else, got {outputs} outputs with {cursors} cursors requested"
            )),
            Self::CursorWithOutputs if cursors != 1 => Some(format!(
                "expected exactly one requested cursor, got {cursors}"
            )),
            Self::Cursors if cursors == 0 => Some("no cursor requested".into()),
            _ => None,
        }
    }
}

/// Everything one call produced, before the variant picks its part.
struct Completed<T> {
    return_value: Option<Value>,
    outputs: Outputs,
    cursors: Vec<(String, Vec<T>)>,
}

impl<T> Completed<T> {
    fn row_count(&self) -> usize {
        self.cursors.iter().map(|(_, rows)| rows.len()).sum()
    }
}

impl ProcedureExecutor {
    /// Executor over `source` with [`DEFAULT_FETCH_SIZE`].
    pub fn new(source: Arc<dyn ConnectionSource>) -> Self {
        Self {
            source,
            fetch_size: DEFAULT_FETCH_SIZE,
        }
    }

    /// Set the cursor batch size. Values below 1 are raised to 1.
    pub fn with_fetch_size(mut self, fetch_size: usize) -> Self {
        self.fetch_size = fetch_size.max(1);
        self
    }

    /// Configured cursor batch size.
    pub fn fetch_size(&self) -> usize {
        self.fetch_size
    }

    /// Call a procedure that takes inputs and returns nothing.
    pub async fn call_void(&self, req: &CallRequest) -> Result<(), DomainError> {
        self.run::<Row>(req, Variant::Void, &ColumnMapper).await?;
        Ok(())
    }

    /// Call a function and return its single result.
    ///
    /// A null result comes back as [`Value::Null`], never as a zero.
    pub async fn call_scalar(&self, req: &CallRequest) -> Result<Value, DomainError> {
        let completed = self.run::<Row>(req, Variant::Scalar, &ColumnMapper).await?;
        Ok(completed.return_value.unwrap_or(Value::Null))
    }

    /// Call a procedure with scalar outputs and return them by name.
    ///
    /// Every declared output is present; unset ones are [`Value::Null`].
    pub async fn call_with_outputs(&self, req: &CallRequest) -> Result<Outputs, DomainError> {
        let completed = self.run::<Row>(req, Variant::Outputs, &ColumnMapper).await?;
        Ok(completed.outputs)
    }

    /// Call a procedure whose only output is a cursor and map every row.
    pub async fn call_cursor<T: Send>(
        &self,
        req: &CallRequest,
        mapper: &dyn RowMapper<T>,
    ) -> Result<Vec<T>, DomainError> {
        let completed = self.run(req, Variant::Cursor, mapper).await?;
        Ok(completed
            .cursors
            .into_iter()
            .next()
            .map(|(_, rows)| rows)
            .unwrap_or_default())
    }

    /// [`call_cursor`](Self::call_cursor) with generic column records.
    pub async fn call_cursor_rows(&self, req: &CallRequest) -> Result<Vec<Row>, DomainError> {
        self.call_cursor::<Row>(req, &ColumnMapper).await
    }

    /// Call a procedure with one requested cursor and scalar outputs.
    ///
    /// Other cursor outputs the routine declares are closed without being
    /// drained.
    pub async fn call_cursor_with_outputs<T: Send>(
        &self,
        req: &CallRequest,
        mapper: &dyn RowMapper<T>,
    ) -> Result<CursorResult<T>, DomainError> {
        let completed = self.run(req, Variant::CursorWithOutputs, mapper).await?;
        let rows = completed
            .cursors
            .into_iter()
            .next()
            .map(|(_, rows)| rows)
            .unwrap_or_default();
        Ok(CursorResult {
            rows,
            outputs: completed.outputs,
        })
    }

    /// Call a procedure with several cursors, draining every requested one
    /// with `mapper`.
    pub async fn call_cursors<T: Send>(
        &self,
        req: &CallRequest,
        mapper: &dyn RowMapper<T>,
    ) -> Result<CursorSet<T>, DomainError> {
        let completed = self.run(req, Variant::Cursors, mapper).await?;
        Ok(CursorSet::new(completed.cursors, completed.outputs))
    }

    async fn run<T: Send>(
        &self,
        req: &CallRequest,
        variant: Variant,
        mapper: &dyn RowMapper<T>,
    ) -> Result<Completed<T>, DomainError> {
        let routine = req.routine();
        if let Some(reason) = variant.mismatch(req) {
            tracing::error!(
                routine = %routine,
                variant = variant.as_str(),
                reason = %reason,
                "call shape does not match variant"
            );
            return Err(DomainError::invalid_call(routine, reason));
        }

        let span = tracing::debug_span!(
            "procedure_call",
            routine = %routine,
            variant = variant.as_str()
        );
        let started = Instant::now();
        let result = self.invoke(req, mapper).instrument(span.clone()).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let result = result.map_err(|cause| DomainError::from_driver(routine, cause));
        span.in_scope(|| match &result {
            Ok(completed) => {
                tracing::debug!(rows = completed.row_count(), elapsed_ms, "call completed");
            }
            Err(err) => {
                tracing::warn!(
                    kind = %err.kind,
                    code = err.code.as_deref().unwrap_or(""),
                    elapsed_ms,
                    error = %err.message,
                    "call failed"
                );
            }
        });
        result
    }

    async fn invoke<T: Send>(
        &self,
        req: &CallRequest,
        mapper: &dyn RowMapper<T>,
    ) -> Result<Completed<T>, DriverError> {
        let mut conn = self.source.acquire().await?;

        for (param, value) in req.bound_inputs() {
            conn.bind(param, value)?;
        }
        for param in req.output_params() {
            conn.register_output(param)?;
        }

        let form = match req.returns() {
            Some(returns) => CallForm::Function { returns },
            None => CallForm::Procedure,
        };
        conn.execute(req.routine(), form).await?;

        let mut cursors = Vec::with_capacity(req.cursor_names().len());
        for name in req.cursor_names() {
            let rows = drain(conn.as_mut(), name, mapper, self.fetch_size).await?;
            cursors.push((name.clone(), rows));
        }
        for param in req.unrequested_cursors() {
            conn.close_cursor(param.name()).await?;
        }

        let return_value = match form {
            CallForm::Function { .. } => Some(conn.return_value()?),
            CallForm::Procedure => None,
        };
        let mut outputs = Outputs::new();
        for param in req.scalar_outputs() {
            outputs.insert(param.name().to_string(), conn.output(param.name())?);
        }

        conn.finish().await?;
        Ok(Completed {
            return_value,
            outputs,
            cursors,
        })
    }
}

/// Fetch `cursor` to exhaustion, mapping each row once in order, then close it.
async fn drain<T: Send>(
    conn: &mut dyn RoutineConnection,
    cursor: &str,
    mapper: &dyn RowMapper<T>,
    fetch_size: usize,
) -> Result<Vec<T>, DriverError> {
    let mut rows = Vec::new();
    loop {
        let batch = conn.fetch(cursor, fetch_size).await?;
        let exhausted = batch.len() < fetch_size;
        rows.reserve(batch.len());
        for row in &batch {
            rows.push(mapper.map_row(row)?);
        }
        if exhausted {
            break;
        }
    }
    conn.close_cursor(cursor).await?;
    tracing::trace!(cursor, rows = rows.len(), "cursor drained");
    Ok(rows)
}
