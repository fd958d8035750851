//! Audit run orchestration.

use crate::error::{AuditError, Result};
use crate::resolver::{resolve_destinations, Resolution, ResolveStrategy};
use crate::scanner::scan_destination;
use crate::summary::AuditSummary;
use crate::traits::{DocumentStore, ReplicationStatus, ReportSink};
use futures::stream::{self, StreamExt};
use raven_etag::Etag;
use std::future::Future;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Key prefix of RavenDB's own bookkeeping documents.
pub const DEFAULT_INTERNAL_PREFIX: &str = "Raven/";

/// Records in flight between the scanners and the report writer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Options for an audit run.
#[derive(Debug, Clone)]
pub struct AuditOptions {
    pub strategy: ResolveStrategy,
    /// Destinations scanned at the same time. With more than one, rows of
    /// different destinations interleave in the report.
    pub concurrency: usize,
    /// Documents whose key starts with this prefix are never reported.
    pub internal_prefix: String,
    pub channel_capacity: usize,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            strategy: ResolveStrategy::default(),
            concurrency: 1,
            internal_prefix: DEFAULT_INTERNAL_PREFIX.to_string(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Runs an audit against a source store and its replication status.
pub struct Auditor<'a, S: ?Sized, R: ?Sized> {
    store: &'a S,
    status: &'a R,
    options: AuditOptions,
}

impl<'a, S, R> Auditor<'a, S, R>
where
    S: DocumentStore + ?Sized,
    R: ReplicationStatus + ?Sized,
{
    pub fn new(store: &'a S, status: &'a R, options: AuditOptions) -> Self {
        Self {
            store,
            status,
            options,
        }
    }

    pub fn options(&self) -> &AuditOptions {
        &self.options
    }

    /// Audit every destination and write the missing documents to `sink`.
    ///
    /// The source high-water mark is read once, before any destination is
    /// resolved, so documents written while the audit runs are left out.
    /// Every destination is scanned by exactly one worker; all workers feed
    /// a single writer loop that owns the sink.
    pub async fn run(&self, sink: &mut dyn ReportSink) -> Result<AuditSummary> {
        self.run_until(sink, std::future::pending()).await
    }

    /// Like [`Auditor::run`], but stops scanning once `shutdown` resolves.
    ///
    /// Workers are dropped at that point. Records they already handed over
    /// are still written and flushed before this returns, and the summary
    /// is marked as interrupted.
    pub async fn run_until<F>(&self, sink: &mut dyn ReportSink, shutdown: F) -> Result<AuditSummary>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let prepared = tokio::select! {
            prepared = self.prepare() => Some(prepared?),
            _ = &mut shutdown => None,
        };
        let Some((high_water, Resolution { positions, skipped })) = prepared else {
            info!("Interrupted before scanning started");
            sink.flush()?;
            return Ok(AuditSummary {
                high_water: Etag::EMPTY,
                destinations: Vec::new(),
                records_written: 0,
                interrupted: true,
            });
        };
        let mut destinations = skipped;

        let concurrency = self.options.concurrency.max(1);
        let internal_prefix = self.options.internal_prefix.as_str();
        let store = self.store;
        let (tx, mut rx) = mpsc::channel(self.options.channel_capacity.max(1));

        debug!(
            "Scanning {} destinations with {} workers",
            positions.len(),
            concurrency
        );

        let workers = async move {
            let tx = tx;
            let scans = stream::iter(positions)
                .map(|position| {
                    let tx = tx.clone();
                    async move {
                        scan_destination(store, &position, high_water, internal_prefix, &tx).await
                    }
                })
                .buffered(concurrency);
            tokio::pin!(scans);

            let mut scanned = Vec::new();
            let interrupted = loop {
                tokio::select! {
                    next = scans.next() => match next {
                        Some(audit) => scanned.push(audit),
                        None => break false,
                    },
                    _ = &mut shutdown => break true,
                }
            };
            // Dropping the scans and the last sender ends the writer loop
            // once the channel is drained.
            (scanned, interrupted)
        };

        let writer = async move {
            let mut written = 0u64;
            while let Some(record) = rx.recv().await {
                sink.write_record(record)?;
                written += 1;
            }
            sink.flush()?;
            Ok::<u64, AuditError>(written)
        };

        let ((scanned, interrupted), written) = tokio::join!(workers, writer);
        let records_written = written?;
        if interrupted {
            info!(
                "Interrupted after {} of the lagging destinations, {} rows written",
                scanned.len(),
                records_written
            );
        }
        destinations.extend(scanned);

        Ok(AuditSummary {
            high_water,
            destinations,
            records_written,
            interrupted,
        })
    }

    async fn prepare(&self) -> Result<(Etag, Resolution)> {
        let statistics = self.store.statistics().await?;
        let high_water = statistics.last_doc_etag;
        info!("Source high-water mark: {}", high_water);

        let resolution = resolve_destinations(self.status, self.options.strategy).await?;
        Ok((high_water, resolution))
    }
}
