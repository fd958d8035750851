//! Destination resolution.
//!
//! Produces the list of destinations to audit, each with the last etag it
//! acknowledged, from one of two sources:
//!
//! - **Aggregated**: one replication-status call against the source, which
//!   reports every destination's last replicated etag
//! - **Per destination**: the stored replication configuration lists the
//!   destinations, and each one is asked what it last received
//!
//! Source-side failures end the run. A destination that cannot be reached or
//! answers with a malformed etag is skipped and reported in the summary.

use crate::error::{AuditError, Result};
use crate::summary::DestinationAudit;
use crate::traits::ReplicationStatus;
use crate::types::{Destination, DestinationPosition};
use raven_etag::Etag;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// How destinations and their positions are discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveStrategy {
    /// One replication-status call against the source.
    #[default]
    Aggregated,
    /// Configuration document plus one query per destination.
    PerDestination,
}

/// Destinations ready for scanning, plus those that could not be resolved.
#[derive(Debug, Default)]
pub struct Resolution {
    pub positions: Vec<DestinationPosition>,
    pub skipped: Vec<DestinationAudit>,
}

impl Resolution {
    /// Add a resolved destination. A destination already present (same
    /// database URL) is replaced in place by the newer report.
    fn push(&mut self, index: &mut HashMap<String, usize>, position: DestinationPosition) {
        let key = position.destination.dedup_key();
        match index.get(&key) {
            Some(&existing) => {
                debug!(
                    "Destination {} reported more than once, keeping the latest entry",
                    key
                );
                self.positions[existing] = position;
            }
            None => {
                index.insert(key, self.positions.len());
                self.positions.push(position);
            }
        }
    }

    fn skip(&mut self, url: &str, reason: String) {
        self.skipped.push(DestinationAudit::skipped(url, reason));
    }
}

/// Resolve the destinations of the source with the given strategy.
pub async fn resolve_destinations<R: ReplicationStatus + ?Sized>(
    status: &R,
    strategy: ResolveStrategy,
) -> Result<Resolution> {
    let resolution = match strategy {
        ResolveStrategy::Aggregated => resolve_aggregated(status).await?,
        ResolveStrategy::PerDestination => resolve_per_destination(status).await?,
    };

    info!(
        "Resolved {} destinations ({} skipped)",
        resolution.positions.len(),
        resolution.skipped.len()
    );
    Ok(resolution)
}

async fn resolve_aggregated<R: ReplicationStatus + ?Sized>(status: &R) -> Result<Resolution> {
    let stats = status.replication_info().await?;
    debug!("Replication status lists {} destinations", stats.len());

    let mut resolution = Resolution::default();
    let mut index = HashMap::new();

    for entry in stats {
        match parse_acknowledged(entry.last_replicated_etag.as_deref(), &entry.url) {
            Ok(last_acknowledged) => resolution.push(
                &mut index,
                DestinationPosition {
                    destination: Destination::new(entry.url, None),
                    last_acknowledged,
                },
            ),
            Err(e) => {
                warn!("Skipping destination {}: {}", entry.url, e);
                resolution.skip(&entry.url, e.to_string());
            }
        }
    }

    Ok(resolution)
}

async fn resolve_per_destination<R: ReplicationStatus + ?Sized>(status: &R) -> Result<Resolution> {
    let mut resolution = Resolution::default();

    let Some(document) = status.load_destinations().await? else {
        warn!("No replication destinations configured on the source");
        return Ok(resolution);
    };
    debug!(
        "Replication configuration of source {} lists {} destinations",
        document.source,
        document.destinations.len()
    );

    let mut index = HashMap::new();

    for config in &document.destinations {
        let destination = config.destination();

        if config.disabled {
            info!("Skipping disabled destination {}", destination.url);
            resolution.skip(&destination.url, "replication disabled".to_string());
            continue;
        }

        let acknowledged = match status
            .last_acknowledged(&destination, &document.source)
            .await
        {
            Ok(acknowledged) => acknowledged,
            Err(e) => {
                warn!(
                    "Failed to query destination {} for its last etag: {}",
                    destination.url, e
                );
                resolution.skip(&destination.url, e.to_string());
                continue;
            }
        };

        match parse_acknowledged(
            acknowledged.last_document_etag.as_deref(),
            &destination.url,
        ) {
            Ok(last_acknowledged) => resolution.push(
                &mut index,
                DestinationPosition {
                    destination,
                    last_acknowledged,
                },
            ),
            Err(e) => {
                warn!("Skipping destination {}: {}", destination.url, e);
                resolution.skip(&destination.url, e.to_string());
            }
        }
    }

    Ok(resolution)
}

/// A missing token means the destination has received nothing yet.
fn parse_acknowledged(token: Option<&str>, origin: &str) -> Result<Etag> {
    match token {
        None => Ok(Etag::EMPTY),
        Some(token) => Etag::parse(token).map_err(|e| AuditError::parse(origin, e)),
    }
}
