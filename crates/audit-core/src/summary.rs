//! Per-destination outcome of an audit run.

use raven_etag::Etag;
use tracing::{info, warn};

/// What happened to one destination during the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationState {
    /// The destination acknowledged the source high-water mark.
    Current,
    /// The destination is behind; `records` rows were reported for it.
    Lagging { records: u64, internal_skipped: u64 },
    /// The destination was not audited.
    Skipped { reason: String },
    /// The scan started but the document stream failed. Rows reported
    /// before the failure stay in the report.
    Failed { reason: String, records: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationAudit {
    pub destination_url: String,
    pub last_acknowledged: Option<Etag>,
    pub state: DestinationState,
}

impl DestinationAudit {
    pub fn skipped(destination_url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            destination_url: destination_url.into(),
            last_acknowledged: None,
            state: DestinationState::Skipped {
                reason: reason.into(),
            },
        }
    }

    /// Rows this destination contributed to the report.
    pub fn records(&self) -> u64 {
        match self.state {
            DestinationState::Lagging { records, .. } | DestinationState::Failed { records, .. } => {
                records
            }
            DestinationState::Current | DestinationState::Skipped { .. } => 0,
        }
    }
}

/// Result of a completed audit run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditSummary {
    /// Source etag the run audited up to.
    pub high_water: Etag,
    pub destinations: Vec<DestinationAudit>,
    /// Rows handed to the report sink.
    pub records_written: u64,
    /// The run was stopped before every destination was scanned.
    pub interrupted: bool,
}

impl AuditSummary {
    pub fn destination(&self, url: &str) -> Option<&DestinationAudit> {
        self.destinations.iter().find(|d| d.destination_url == url)
    }

    pub fn lagging_count(&self) -> usize {
        self.destinations
            .iter()
            .filter(|d| matches!(d.state, DestinationState::Lagging { .. }))
            .count()
    }

    /// Log one line per destination plus a total.
    pub fn log(&self) {
        for audit in &self.destinations {
            match &audit.state {
                DestinationState::Current => {
                    info!("{}: up to date", audit.destination_url);
                }
                DestinationState::Lagging {
                    records,
                    internal_skipped,
                } => {
                    info!(
                        "{}: {} documents not yet replicated ({} internal documents ignored)",
                        audit.destination_url, records, internal_skipped
                    );
                }
                DestinationState::Skipped { reason } => {
                    warn!("{}: skipped ({})", audit.destination_url, reason);
                }
                DestinationState::Failed { reason, records } => {
                    warn!(
                        "{}: scan aborted after {} documents ({})",
                        audit.destination_url, records, reason
                    );
                }
            }
        }
        if self.interrupted {
            warn!(
                "Audit up to etag {} interrupted: {} destinations finished, {} rows written",
                self.high_water,
                self.destinations.len(),
                self.records_written
            );
            return;
        }
        info!(
            "Audit up to etag {} complete: {} destinations, {} lagging, {} rows written",
            self.high_water,
            self.destinations.len(),
            self.lagging_count(),
            self.records_written
        );
    }
}
