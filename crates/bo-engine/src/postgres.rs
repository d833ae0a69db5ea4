//! # PostgreSQL Backend
//!
//! Runs routine calls on PostgreSQL via SQLx. Packages map to schemas and
//! routines are invoked with named notation, so declaration order on the
//! Rust side only has to agree with itself:
//!
//! ```text
//! CALL "bo_payment"."search"("p_status" => $1::varchar,
//!     "p_total_count" => NULL::bigint, "p_cursor" => NULL::refcursor)
//! SELECT "bo_message"."unread_count"("p_user" => $1::varchar)::bigint AS result
//! ```
//!
//! Each lease runs inside its own transaction: cursors returned through
//! `refcursor` OUT parameters are portals that only live until commit.
//! Portals are drained with `FETCH FORWARD n` and closed with `CLOSE`.
//! [`RoutineConnection::finish`] commits; a lease dropped before that rolls
//! back when SQLx returns the connection to the pool.
//!
//! Routine and parameter names are validated identifiers
//! ([`bo_core::routine::validate_identifier`]). They are folded to lower
//! case, matching how PostgreSQL stores an unquoted declaration, and then
//! quoted, so characters such as `#` and `$` never reach the parser as
//! operators.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bo_core::{
    CallForm, Column, ConnectionSource, CursorRow, DriverError, ParameterDescriptor,
    RoutineConnection, RoutineName, SqlType, Value,
};
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column as _, PgConnection, Postgres, Row as _, Transaction, TypeInfo as _, ValueRef as _};

use crate::config::EngineConfig;

/// Pooled PostgreSQL connections.
#[derive(Debug, Clone)]
pub struct PgConnectionSource {
    pool: PgPool,
}

impl PgConnectionSource {
    /// Open a pool sized and timed by `config`.
    pub async fn connect(config: &EngineConfig) -> Result<Self, sqlx::Error> {
        let statement_timeout_ms = config.statement_timeout_secs.saturating_mul(1000);
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    if statement_timeout_ms > 0 {
                        sqlx::query("SELECT set_config('statement_timeout', $1, false)")
                            .bind(format!("{statement_timeout_ms}ms"))
                            .execute(conn)
                            .await?;
                    }
                    Ok(())
                })
            })
            .connect(config.database_url.as_str())
            .await?;

        tracing::info!(
            max_connections = config.max_connections,
            statement_timeout_secs = config.statement_timeout_secs,
            "Connected to PostgreSQL"
        );
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ConnectionSource for PgConnectionSource {
    async fn acquire(&self) -> Result<Box<dyn RoutineConnection>, DriverError> {
        let tx = self.pool.begin().await.map_err(driver_error)?;
        Ok(Box::new(PgRoutineConnection::new(tx)))
    }
}

/// State of one cursor output after execute.
#[derive(Debug)]
enum Portal {
    /// The routine left the refcursor null.
    Unopened,
    Open(String),
    Closed,
}

/// One transaction-scoped lease.
struct PgRoutineConnection {
    tx: Option<Transaction<'static, Postgres>>,
    inputs: Vec<(ParameterDescriptor, Value)>,
    outputs: Vec<ParameterDescriptor>,
    form: Option<CallForm>,
    result: Option<PgRow>,
    portals: HashMap<String, Portal>,
    columns: HashMap<String, Arc<[Column]>>,
}

impl PgRoutineConnection {
    fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self {
            tx: Some(tx),
            inputs: Vec::new(),
            outputs: Vec::new(),
            form: None,
            result: None,
            portals: HashMap::new(),
            columns: HashMap::new(),
        }
    }

    fn conn(&mut self) -> Result<&mut PgConnection, DriverError> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| DriverError::Protocol("call already finished".into()))
    }

    fn result_row(&self) -> Result<&PgRow, DriverError> {
        self.result
            .as_ref()
            .ok_or_else(|| DriverError::Protocol("routine returned no result row".into()))
    }

    fn registered(&self, name: &str) -> Result<&ParameterDescriptor, DriverError> {
        self.outputs
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| DriverError::Protocol(format!("{name} is not a registered output")))
    }
}

#[async_trait]
impl RoutineConnection for PgRoutineConnection {
    fn bind(&mut self, param: &ParameterDescriptor, value: &Value) -> Result<(), DriverError> {
        let coerced = value
            .coerce_to(param.sql_type())
            .map_err(|e| DriverError::Bind {
                parameter: param.name().to_string(),
                message: e.to_string(),
            })?;
        self.inputs.push((param.clone(), coerced));
        Ok(())
    }

    fn register_output(&mut self, param: &ParameterDescriptor) -> Result<(), DriverError> {
        self.outputs.push(param.clone());
        Ok(())
    }

    async fn execute(&mut self, routine: &RoutineName, form: CallForm) -> Result<(), DriverError> {
        let sql = call_sql(routine, form, &self.inputs, &self.outputs);
        tracing::trace!(sql = %sql, "executing routine");

        let mut query = sqlx::query(&sql);
        for (param, value) in &self.inputs {
            query = bind_value(query, param.sql_type(), value);
        }
        let conn = self
            .tx
            .as_deref_mut()
            .ok_or_else(|| DriverError::Protocol("call already finished".into()))?;
        let row = query.fetch_optional(conn).await.map_err(driver_error)?;

        let mut portals = HashMap::new();
        for param in self.outputs.iter().filter(|p| p.sql_type().is_cursor()) {
            let name = match &row {
                Some(row) => portal_name(row, param.name())?,
                None => None,
            };
            let portal = name.map(Portal::Open).unwrap_or(Portal::Unopened);
            portals.insert(param.name().to_ascii_uppercase(), portal);
        }

        self.form = Some(form);
        self.result = row;
        self.portals = portals;
        Ok(())
    }

    async fn fetch(&mut self, cursor: &str, max_rows: usize) -> Result<Vec<CursorRow>, DriverError> {
        let key = cursor.to_ascii_uppercase();
        let portal = match self.portals.get(&key) {
            Some(Portal::Open(portal)) => portal.clone(),
            Some(Portal::Unopened) => return Ok(Vec::new()),
            Some(Portal::Closed) => {
                return Err(DriverError::Protocol(format!("cursor {cursor} is closed")))
            }
            None => {
                return Err(DriverError::Protocol(format!(
                    "{cursor} is not a registered cursor output"
                )))
            }
        };

        let sql = format!("FETCH FORWARD {max_rows} FROM {}", quote_ident(&portal));
        let conn = self.conn()?;
        let rows = sqlx::query(&sql)
            .persistent(false)
            .fetch_all(conn)
            .await
            .map_err(driver_error)?;

        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        let columns = match self.columns.get(&key) {
            Some(columns) => Arc::clone(columns),
            None => {
                let columns = describe(first);
                self.columns.insert(key, Arc::clone(&columns));
                columns
            }
        };
        rows.iter()
            .map(|row| CursorRow::new(Arc::clone(&columns), decode_row(row)?))
            .collect()
    }

    async fn close_cursor(&mut self, cursor: &str) -> Result<(), DriverError> {
        let key = cursor.to_ascii_uppercase();
        let Some(state) = self.portals.get_mut(&key) else {
            return Err(DriverError::Protocol(format!(
                "{cursor} is not a registered cursor output"
            )));
        };
        let portal = match std::mem::replace(state, Portal::Closed) {
            Portal::Open(portal) => portal,
            Portal::Unopened | Portal::Closed => return Ok(()),
        };

        let sql = format!("CLOSE {}", quote_ident(&portal));
        let conn = self.conn()?;
        sqlx::query(&sql)
            .persistent(false)
            .execute(conn)
            .await
            .map_err(driver_error)?;
        Ok(())
    }

    fn return_value(&mut self) -> Result<Value, DriverError> {
        if !matches!(self.form, Some(CallForm::Function { .. })) {
            return Err(DriverError::Protocol("routine was not called as a function".into()));
        }
        decode_value(self.result_row()?, 0)
    }

    fn output(&mut self, name: &str) -> Result<Value, DriverError> {
        let sql_type = self.registered(name)?.sql_type();
        let row = self.result_row()?;
        let Some(index) = column_index(row, name) else {
            return Ok(Value::Null);
        };
        decode_value(row, index)?
            .coerce_to(sql_type)
            .map_err(|e| DriverError::decode(name, e.to_string()))
    }

    async fn finish(&mut self) -> Result<(), DriverError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| DriverError::Protocol("call already finished".into()))?;
        tx.commit().await.map_err(driver_error)
    }
}

/// Build the statement for one call.
fn call_sql(
    routine: &RoutineName,
    form: CallForm,
    inputs: &[(ParameterDescriptor, Value)],
    outputs: &[ParameterDescriptor],
) -> String {
    let mut args: Vec<String> = inputs
        .iter()
        .enumerate()
        .map(|(i, (param, _))| {
            format!("{} => ${}::{}", pg_ident(param.name()), i + 1, pg_type(param.sql_type()))
        })
        .collect();

    let target = format!("{}.{}", pg_ident(routine.package()), pg_ident(routine.procedure()));
    match form {
        CallForm::Procedure => {
            args.extend(
                outputs
                    .iter()
                    .map(|p| format!("{} => NULL::{}", pg_ident(p.name()), pg_type(p.sql_type()))),
            );
            format!("CALL {target}({})", args.join(", "))
        }
        CallForm::Function { returns } => {
            format!("SELECT {target}({})::{} AS result", args.join(", "), pg_type(returns))
        }
    }
}

fn pg_type(sql_type: SqlType) -> &'static str {
    match sql_type {
        SqlType::Varchar => "varchar",
        SqlType::Char => "bpchar",
        SqlType::Clob => "text",
        SqlType::Number => "numeric",
        SqlType::Integer => "bigint",
        SqlType::Date => "date",
        SqlType::Timestamp => "timestamp",
        SqlType::Flag => "boolean",
        SqlType::Blob => "bytea",
        SqlType::Cursor => "refcursor",
    }
}

/// Bind an already coerced value as the Rust type matching `sql_type`.
/// Nulls bind as typed `None`.
fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    sql_type: SqlType,
    value: &Value,
) -> Query<'q, Postgres, PgArguments> {
    match sql_type {
        SqlType::Varchar | SqlType::Char | SqlType::Clob | SqlType::Cursor => {
            query.bind(value.as_str().map(str::to_owned))
        }
        SqlType::Number => query.bind(value.as_decimal()),
        SqlType::Integer => query.bind(value.as_i64()),
        SqlType::Date => query.bind(value.as_date()),
        SqlType::Timestamp => query.bind(value.as_timestamp()),
        SqlType::Flag => query.bind(value.as_bool()),
        SqlType::Blob => query.bind(value.as_bytes().map(<[u8]>::to_vec)),
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// A validated routine or parameter name as PostgreSQL stores it.
fn pg_ident(ident: &str) -> String {
    quote_ident(&ident.to_ascii_lowercase())
}

fn column_index(row: &PgRow, name: &str) -> Option<usize> {
    row.columns()
        .iter()
        .position(|c| c.name().eq_ignore_ascii_case(name))
}

fn portal_name(row: &PgRow, param: &str) -> Result<Option<String>, DriverError> {
    let Some(index) = column_index(row, param) else {
        return Ok(None);
    };
    // refcursor has no Rust mapping in SQLx; its wire form is the portal name.
    row.try_get_unchecked::<Option<String>, _>(index)
        .map_err(|e| DriverError::decode(param, e.to_string()))
}

fn describe(row: &PgRow) -> Arc<[Column]> {
    row.columns()
        .iter()
        .map(|c| Column::new(c.name(), c.type_info().name()))
        .collect()
}

fn decode_row(row: &PgRow) -> Result<Vec<Value>, DriverError> {
    (0..row.len()).map(|i| decode_value(row, i)).collect()
}

fn decode_value(row: &PgRow, index: usize) -> Result<Value, DriverError> {
    let column = row
        .columns()
        .get(index)
        .ok_or_else(|| DriverError::Protocol(format!("no column at index {index}")))?;
    let name = column.name();
    let raw = row
        .try_get_raw(index)
        .map_err(|e| DriverError::decode(name, e.to_string()))?;
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let type_name = column.type_info().name().to_ascii_uppercase();
    let decoded = match type_name.as_str() {
        "BOOL" => row.try_get::<bool, _>(index).map(Value::Flag),
        "INT2" => row.try_get::<i16, _>(index).map(|v| Value::Integer(v.into())),
        "INT4" => row.try_get::<i32, _>(index).map(|v| Value::Integer(v.into())),
        "INT8" => row.try_get::<i64, _>(index).map(Value::Integer),
        "NUMERIC" => row.try_get::<Decimal, _>(index).map(Value::Number),
        "FLOAT4" => row
            .try_get::<f32, _>(index)
            .and_then(|v| float_to_number(f64::from(v))),
        "FLOAT8" => row.try_get::<f64, _>(index).and_then(float_to_number),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => row.try_get::<String, _>(index).map(Value::Text),
        "REFCURSOR" => row
            .try_get_unchecked::<String, _>(index)
            .map(Value::Text),
        "DATE" => row.try_get::<chrono::NaiveDate, _>(index).map(Value::Date),
        "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(index)
            .map(Value::Timestamp),
        "TIMESTAMPTZ" => row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(index)
            .map(|v| Value::Timestamp(v.naive_utc())),
        "BYTEA" => row.try_get::<Vec<u8>, _>(index).map(Value::Blob),
        "UUID" => row
            .try_get::<uuid::Uuid, _>(index)
            .map(|v| Value::Text(v.to_string())),
        "JSON" | "JSONB" => row
            .try_get::<serde_json::Value, _>(index)
            .map(|v| Value::Text(v.to_string())),
        other => {
            return Err(DriverError::decode(
                name,
                format!("unsupported column type {other}"),
            ))
        }
    };
    decoded.map_err(|e| DriverError::decode(name, e.to_string()))
}

fn float_to_number(v: f64) -> Result<Value, sqlx::Error> {
    Decimal::try_from(v)
        .map(Value::Number)
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

/// Classify a SQLx failure for the error taxonomy.
fn driver_error(err: sqlx::Error) -> DriverError {
    match &err {
        sqlx::Error::Database(db) => DriverError::Database {
            code: db.code().map(|c| c.into_owned()),
            message: db.message().to_string(),
        },
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => DriverError::Connection {
            message: err.to_string(),
        },
        sqlx::Error::ColumnDecode { index, source } => DriverError::decode(index.clone(), source.to_string()),
        _ => DriverError::Protocol(err.to_string()),
    }
}
