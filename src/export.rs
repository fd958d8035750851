//! One audit run from the command line: RavenDB client in, CSV report out.

use crate::Cli;
use anyhow::Context;
use audit_core::{AuditSummary, Auditor};
use csv_report::{ReportFile, ReportMetrics};
use ravendb_client::RavenClient;
use std::future::Future;
use tracing::{info, warn};

/// What a finished (or interrupted) run produced.
#[derive(Debug)]
pub struct AuditOutcome {
    pub summary: AuditSummary,
    pub report: ReportMetrics,
}

impl AuditOutcome {
    pub fn interrupted(&self) -> bool {
        self.summary.interrupted
    }
}

/// Run the audit described by `cli` until it completes or `shutdown`
/// resolves.
///
/// Rows found before an interrupt are kept in the report. A failed run
/// leaves any earlier report in place.
pub async fn run_with_shutdown<F>(cli: &Cli, shutdown: F) -> anyhow::Result<AuditOutcome>
where
    F: Future<Output = ()>,
{
    let client = RavenClient::new(
        cli.source.url.trim(),
        cli.source.database.trim(),
        cli.audit.client_options(),
    )?;
    info!(
        "Auditing replication of '{}' on {}",
        client.database(),
        client.server_url()
    );

    let mut report = ReportFile::create(
        &cli.output.output_dir,
        client.database(),
        cli.output.report_options(),
    )
    .with_context(|| {
        format!(
            "Failed to create report in '{}'",
            cli.output.output_dir.display()
        )
    })?;

    let auditor = Auditor::new(&client, &client, cli.audit.audit_options());
    let summary = match auditor.run_until(&mut report, shutdown).await {
        Ok(summary) => summary,
        Err(e) => {
            report.discard();
            return Err(e.into());
        }
    };

    let report = report.finish().context("Failed to finish report")?;
    summary.log();
    if summary.interrupted {
        warn!(
            "Interrupted; partial report holds {} rows",
            report.rows_written
        );
    }
    Ok(AuditOutcome { summary, report })
}
