//! not-yet-replicated
//!
//! Lists, for every replication destination of a RavenDB database, the
//! documents the destination has not acknowledged yet. The result is a CSV
//! report `Not-yet-replicated-at-<database>.csv` with one row per missing
//! document and destination.
//!
//! # CLI Usage
//!
//! ```bash
//! # Positions from the source's replication statistics (default)
//! not-yet-replicated http://localhost:8080 Northwind
//!
//! # Ask every configured destination, three at a time
//! not-yet-replicated http://localhost:8080 Northwind \
//!   --strategy per-destination --concurrency 3 \
//!   --output-dir /tmp/reports
//! ```
//!
//! The audit itself lives in `audit-core`; this crate wires the RavenDB
//! client and the CSV writer to it.

use audit_core::{AuditError, AuditOptions, ResolveStrategy, DEFAULT_INTERNAL_PREFIX};
use clap::{Args, Parser, ValueEnum};
use csv_report::{CsvReportOptions, EmitStrategy, DEFAULT_FLUSH_EVERY};
use ravendb_client::{ClientOptions, DEFAULT_PAGE_SIZE};
use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;

pub mod export;

pub use export::{run_with_shutdown, AuditOutcome};

pub const BANNER: &str = "Exporter of not-yet-exported documents in RavenDB";
pub const USAGE: &str = "Usage : not-yet-replicated <database url> <database name>";

#[derive(Parser, Debug, Clone)]
#[command(name = "not-yet-replicated")]
#[command(about = BANNER)]
#[command(long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub audit: AuditArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// URL of the source RavenDB server
    #[arg(value_name = "DATABASE_URL")]
    pub url: String,

    /// Name of the source database
    #[arg(value_name = "DATABASE_NAME")]
    pub database: String,
}

impl SourceArgs {
    /// Check the positional arguments before anything is contacted or
    /// created.
    pub fn validate(&self) -> Result<(), AuditError> {
        if self.url.trim().is_empty() {
            return Err(AuditError::Argument(
                "Empty url entered...needs to have a value.".to_string(),
            ));
        }
        if self.database.trim().is_empty() {
            return Err(AuditError::Argument(
                "Empty database name entered...needs to have a value.".to_string(),
            ));
        }

        let url = Url::parse(self.url.trim()).map_err(|e| {
            AuditError::Argument(format!("Failed to parse database url. Reason: {e}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AuditError::Argument(format!(
                "Failed to parse database url. Reason: unsupported scheme '{}'",
                url.scheme()
            )));
        }
        Ok(())
    }
}

/// How the position of each destination is looked up.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// One call to the source's replication statistics
    Aggregated,
    /// Ask every configured destination for its last acknowledged etag
    PerDestination,
}

impl From<Strategy> for ResolveStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Aggregated => ResolveStrategy::Aggregated,
            Strategy::PerDestination => ResolveStrategy::PerDestination,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct AuditArgs {
    /// Where destination positions come from
    #[arg(long, value_enum, default_value_t = Strategy::Aggregated, env = "NYR_STRATEGY")]
    pub strategy: Strategy,

    /// Destinations scanned at the same time
    #[arg(long, default_value_t = 1, env = "NYR_CONCURRENCY")]
    pub concurrency: usize,

    /// Key prefix of internal documents that are never reported (empty to report all)
    #[arg(long, default_value = DEFAULT_INTERNAL_PREFIX)]
    pub internal_prefix: String,

    /// Documents fetched per page from the source
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// Timeout of every HTTP request, in seconds
    #[arg(long, default_value_t = 30, value_name = "SECS")]
    pub request_timeout: u64,
}

impl AuditArgs {
    pub fn audit_options(&self) -> AuditOptions {
        AuditOptions {
            strategy: self.strategy.into(),
            concurrency: self.concurrency.max(1),
            internal_prefix: self.internal_prefix.clone(),
            ..AuditOptions::default()
        }
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            request_timeout: Duration::from_secs(self.request_timeout),
            page_size: self.page_size.max(1),
        }
    }
}

/// When report rows are written.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emit {
    /// Write rows as they are found
    Streaming,
    /// Write all rows at the end of the run
    Buffered,
}

#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Directory the report is written to
    #[arg(long, default_value = ".", env = "NYR_OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// When rows are written to the report
    #[arg(long, value_enum, default_value_t = Emit::Streaming)]
    pub emit: Emit,

    /// Rows between two flushes of a streaming report
    #[arg(long, default_value_t = DEFAULT_FLUSH_EVERY)]
    pub flush_every: usize,

    /// Leave out the header line
    #[arg(long)]
    pub no_header: bool,
}

impl OutputArgs {
    pub fn report_options(&self) -> CsvReportOptions {
        let strategy = match self.emit {
            Emit::Streaming => EmitStrategy::Streaming {
                flush_every: self.flush_every,
            },
            Emit::Buffered => EmitStrategy::Buffered,
        };
        CsvReportOptions {
            include_header: !self.no_header,
            strategy,
        }
    }
}
