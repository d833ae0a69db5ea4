//! # Call Subcommand
//!
//! Describes a routine call from flags, picks the invocation variant from
//! the declared shape, and prints the result as JSON.
//!
//! | Declared | Variant |
//! |----------|---------|
//! | `--returns` | scalar function |
//! | nothing | void procedure |
//! | `--out` only | procedure with outputs |
//! | one `--cursor` | cursor procedure |
//! | one `--cursor` and `--out` | cursor procedure with outputs |
//! | several `--cursor` | multi-cursor procedure |

use anyhow::{anyhow, bail, Context, Result};
use bo_core::{CallRequest, ColumnMapper, DomainError, Row, RoutineName, SqlType, Value};
use bo_engine::ProcedureExecutor;
use clap::Args;
use serde_json::json;

/// Arguments for the call subcommand.
#[derive(Args, Debug)]
pub struct CallArgs {
    /// Routine to call, as `PACKAGE.PROCEDURE`.
    pub routine: String,

    /// Input parameter as `NAME:TYPE=VALUE`; omit `=VALUE` to bind NULL.
    #[arg(long = "in", value_name = "NAME:TYPE=VALUE")]
    pub inputs: Vec<String>,

    /// Scalar output parameter as `NAME:TYPE`.
    #[arg(long = "out", value_name = "NAME:TYPE")]
    pub outputs: Vec<String>,

    /// Cursor output parameter to drain.
    #[arg(long = "cursor", value_name = "NAME")]
    pub cursors: Vec<String>,

    /// Call as a function returning this type.
    #[arg(long, value_name = "TYPE")]
    pub returns: Option<String>,
}

/// Invocation variant chosen for a described call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Void,
    Scalar,
    Outputs,
    Cursor,
    CursorWithOutputs,
    Cursors,
}

impl Variant {
    /// Pick the variant from what the call declares.
    pub fn for_shape(returns: bool, outputs: usize, cursors: usize) -> Self {
        match (returns, outputs, cursors) {
            (true, _, _) => Self::Scalar,
            (false, 0, 0) => Self::Void,
            (false, _, 0) => Self::Outputs,
            (false, 0, 1) => Self::Cursor,
            (false, _, 1) => Self::CursorWithOutputs,
            _ => Self::Cursors,
        }
    }
}

/// Execute the call subcommand.
pub async fn run_call(args: &CallArgs, exec: &ProcedureExecutor) -> Result<u8> {
    let (variant, req) = build_request(args)?;
    tracing::debug!(?variant, routine = %req.routine(), "calling");
    match execute(exec, variant, &req).await {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(0)
        }
        Err(err) => {
            eprintln!("{err}");
            Ok(crate::exit_code(&err))
        }
    }
}

/// Turn the flags into a validated request and its variant.
pub fn build_request(args: &CallArgs) -> Result<(Variant, CallRequest)> {
    let routine = RoutineName::parse(&args.routine)
        .with_context(|| format!("invalid routine {:?}", args.routine))?;
    let mut builder = CallRequest::builder(routine.package(), routine.procedure());

    for arg in &args.inputs {
        let (name, ty, value) = parse_input(arg)?;
        builder = builder.input(&name, ty, value);
    }
    for arg in &args.outputs {
        let (name, ty) = parse_output(arg)?;
        builder = builder.output(&name, ty);
    }
    for name in &args.cursors {
        builder = builder.cursor(name.trim());
    }
    if let Some(tag) = &args.returns {
        builder = builder.returns(parse_type(tag)?);
    }

    let variant = Variant::for_shape(
        args.returns.is_some(),
        args.outputs.len(),
        args.cursors.len(),
    );
    let req = builder.build()?;
    Ok((variant, req))
}

/// Run `req` as `variant` and render the result as JSON.
pub async fn execute(
    exec: &ProcedureExecutor,
    variant: Variant,
    req: &CallRequest,
) -> Result<serde_json::Value, DomainError> {
    let rendered = match variant {
        Variant::Void => {
            exec.call_void(req).await?;
            json!({ "status": "ok" })
        }
        Variant::Scalar => json!({ "value": exec.call_scalar(req).await? }),
        Variant::Outputs => json!(exec.call_with_outputs(req).await?),
        Variant::Cursor => json!(exec.call_cursor_rows(req).await?),
        Variant::CursorWithOutputs => json!(
            exec.call_cursor_with_outputs::<Row>(req, &ColumnMapper)
                .await?
        ),
        Variant::Cursors => json!(exec.call_cursors::<Row>(req, &ColumnMapper).await?),
    };
    Ok(rendered)
}

/// Parse `NAME:TYPE=VALUE` (or `NAME:TYPE` for NULL).
pub fn parse_input(arg: &str) -> Result<(String, SqlType, Value)> {
    let (declaration, raw) = match arg.split_once('=') {
        Some((declaration, raw)) => (declaration, Some(raw)),
        None => (arg, None),
    };
    let (name, ty) = parse_output(declaration)?;
    let value = match raw {
        None => Value::Null,
        Some(raw) => Value::from(raw)
            .coerce_to(ty)
            .with_context(|| format!("input {name}"))?,
    };
    Ok((name, ty, value))
}

/// Parse `NAME:TYPE`.
pub fn parse_output(arg: &str) -> Result<(String, SqlType)> {
    let Some((name, tag)) = arg.split_once(':') else {
        bail!("expected NAME:TYPE, got {arg:?}");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("parameter name missing in {arg:?}");
    }
    Ok((name.to_string(), parse_type(tag)?))
}

fn parse_type(tag: &str) -> Result<SqlType> {
    SqlType::parse(tag).ok_or_else(|| anyhow!("unknown type {tag:?}"))
}
