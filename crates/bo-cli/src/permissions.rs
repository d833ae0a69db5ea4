//! # Permissions Subcommand
//!
//! Prints a principal's permission set, or checks one routine against it.

use anyhow::{Context, Result};
use bo_auth::{AuthError, PermissionCache, PermissionCacheConfig};
use bo_core::RoutineName;
use bo_engine::ProcedureExecutor;
use clap::Args;
use serde_json::json;

/// Arguments for the permissions subcommand.
#[derive(Args, Debug)]
pub struct PermissionsArgs {
    /// Principal (user name) to look up. Matched case-insensitively.
    pub principal: String,

    /// Check a single routine (`PACKAGE.PROCEDURE`) instead of listing.
    #[arg(long, value_name = "ROUTINE")]
    pub check: Option<String>,
}

/// Execute the permissions subcommand.
///
/// With `--check`, exits 0 when the routine is allowed and 5 when it is not.
pub async fn run_permissions(args: &PermissionsArgs, exec: &ProcedureExecutor) -> Result<u8> {
    let config = PermissionCacheConfig::from_env().context("loading permission cache settings")?;
    let cache = PermissionCache::new(exec.clone(), config);

    let Some(routine) = &args.check else {
        return match cache.get_permissions(&args.principal).await {
            Ok(set) => {
                println!("{}", serde_json::to_string_pretty(set.as_ref())?);
                Ok(0)
            }
            Err(err) => {
                eprintln!("{err}");
                Ok(crate::exit_code(&err))
            }
        };
    };

    let routine = RoutineName::parse(routine).with_context(|| format!("invalid routine {routine:?}"))?;
    let (allowed, code) = match cache.authorize(&args.principal, &routine).await {
        Ok(()) => (true, 0),
        Err(AuthError::AccessDenied { .. }) => (false, 5),
        Err(AuthError::Lookup(err)) => {
            eprintln!("{err}");
            return Ok(crate::exit_code(&err));
        }
    };
    println!(
        "{}",
        json!({
            "principal": args.principal.trim().to_ascii_uppercase(),
            "routine": routine.permission_key(),
            "allowed": allowed,
        })
    );
    Ok(code)
}
