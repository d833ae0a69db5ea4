//! # bo CLI entry point
//!
//! Parses command-line arguments, builds an executor for the selected
//! backend and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bo_cli::call::{run_call, CallArgs};
use bo_cli::permissions::{run_permissions, PermissionsArgs};

/// Back-office procedure gateway CLI.
///
/// Calls database routines and inspects permission sets. Connects to the
/// database named by `DATABASE_URL` unless `--stub` is given.
#[derive(Parser, Debug)]
#[command(name = "bo", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Run against the built-in demo database instead of PostgreSQL.
    #[arg(long, global = true)]
    stub: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Call a routine and print its result as JSON.
    Call(CallArgs),

    /// Show a principal's permission set or check one routine.
    Permissions(PermissionsArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v when set.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let exec = match bo_cli::backend::executor(cli.stub).await {
        Ok(exec) => exec,
        Err(e) => {
            tracing::error!("{e:#}");
            return ExitCode::from(1);
        }
    };

    let result = match &cli.command {
        Commands::Call(args) => run_call(args, &exec).await,
        Commands::Permissions(args) => run_permissions(args, &exec).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parse_call_with_repeated_flags() {
        let cli = Cli::try_parse_from([
            "bo",
            "call",
            "BO_PAYMENT.STATEMENT",
            "--in",
            "P_CUSTOMER_ID:INTEGER=42",
            "--out",
            "P_TOTAL_COUNT:INTEGER",
            "--cursor",
            "P_PAYMENTS",
            "--cursor",
            "P_FEES",
        ])
        .unwrap();
        assert!(!cli.stub);
        let Commands::Call(args) = cli.command else {
            panic!("expected call");
        };
        assert_eq!(args.routine, "BO_PAYMENT.STATEMENT");
        assert_eq!(args.inputs, ["P_CUSTOMER_ID:INTEGER=42"]);
        assert_eq!(args.cursors, ["P_PAYMENTS", "P_FEES"]);
        assert!(args.returns.is_none());
    }

    #[test]
    fn cli_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["bo", "permissions", "user1", "--stub", "-vv"]).unwrap();
        assert!(cli.stub);
        assert_eq!(cli.verbose, 2);
        let Commands::Permissions(args) = cli.command else {
            panic!("expected permissions");
        };
        assert_eq!(args.principal, "user1");
        assert!(args.check.is_none());
    }

    #[test]
    fn cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["bo"]).is_err());
    }
}
