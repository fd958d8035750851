//! Command-line interface for not-yet-replicated
//!
//! ```bash
//! not-yet-replicated http://localhost:8080 Northwind
//! not-yet-replicated http://localhost:8080 Northwind --strategy per-destination
//! ```
//!
//! Argument errors print a message and exit with status 0. A failed audit
//! prints the reason to stderr and exits with status 1.

use audit_core::AuditError;
use clap::error::ErrorKind;
use clap::Parser;
use not_yet_replicated::{run_with_shutdown, Cli, BANNER, USAGE};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Failed to export not-yet-replicated documents. Reason: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    e.print()?;
                }
                _ => {
                    println!("{BANNER}");
                    println!("{USAGE}");
                    e.print()?;
                }
            }
            return Ok(());
        }
    };

    if let Err(e) = cli.source.validate() {
        match e {
            AuditError::Argument(message) => println!("{message}"),
            other => println!("{other}"),
        }
        return Ok(());
    }

    run_with_shutdown(&cli, shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // Without a signal handler the run is never interrupted.
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl-C, stopping the audit");
}
