//! In-memory collaborators for tests.
//!
//! These stand in for a RavenDB source, its destinations and the report
//! output so the resolver, the scanner and whole audit runs can be tested
//! without a server.

use crate::error::{AuditError, Result};
use crate::traits::{DocumentCursor, DocumentStore, ReplicationStatus, ReportSink};
use crate::types::{
    Destination, DestinationConfig, DestinationStats, DocumentSnapshot, LastAcknowledged,
    ReplicationDestinations, ReportRecord, SourceStatistics,
};
use async_trait::async_trait;
use raven_etag::Etag;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// A source database held in memory.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    documents: Arc<Vec<DocumentSnapshot>>,
    last_doc_etag: Etag,
    failure_at: Option<Etag>,
    stall_at: Option<Etag>,
    stalled: Arc<Notify>,
    unreachable: bool,
    opened: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl MemoryStore {
    /// Documents are kept in etag order; the high-water mark is the largest
    /// etag present.
    pub fn new(mut documents: Vec<DocumentSnapshot>) -> Self {
        documents.sort_by_key(|d| d.etag);
        let last_doc_etag = documents.last().map(|d| d.etag).unwrap_or(Etag::EMPTY);
        Self {
            documents: Arc::new(documents),
            last_doc_etag,
            failure_at: None,
            stall_at: None,
            stalled: Arc::new(Notify::new()),
            unreachable: false,
            opened: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Add a document without moving the high-water mark, as if it was
    /// written after the statistics were read.
    pub fn with_document(self, document: DocumentSnapshot) -> Self {
        let last_doc_etag = self.last_doc_etag;
        let mut documents = (*self.documents).clone();
        documents.push(document);
        let mut store = Self::new(documents);
        store.last_doc_etag = last_doc_etag;
        store
    }

    pub fn with_last_doc_etag(mut self, etag: Etag) -> Self {
        self.last_doc_etag = etag;
        self
    }

    /// Cursors fail when they reach the document at `etag`.
    pub fn failing_at(mut self, etag: Etag) -> Self {
        self.failure_at = Some(etag);
        self
    }

    /// Cursors hang forever when they reach the document at `etag`. The
    /// notifier returned by [`MemoryStore::stalled`] fires at that point,
    /// once every earlier document has been handed out.
    pub fn stalling_at(mut self, etag: Etag) -> Self {
        self.stall_at = Some(etag);
        self
    }

    pub fn stalled(&self) -> Arc<Notify> {
        self.stalled.clone()
    }

    /// Every call fails with a connection error.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn cursors_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Cursors opened and not dropped yet.
    pub fn open_cursors(&self) -> usize {
        self.cursors_opened() - self.released.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable {
            return Err(AuditError::connection("memory://source", "connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn statistics(&self) -> Result<SourceStatistics> {
        self.check_reachable()?;
        Ok(SourceStatistics {
            last_doc_etag: self.last_doc_etag,
        })
    }

    async fn open_document_stream(&self, from: Etag) -> Result<Box<dyn DocumentCursor>> {
        self.check_reachable()?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        let position = self.documents.partition_point(|d| d.etag <= from);
        Ok(Box::new(MemoryCursor {
            documents: self.documents.clone(),
            position,
            failure_at: self.failure_at,
            stall_at: self.stall_at,
            stalled: self.stalled.clone(),
            released: self.released.clone(),
        }))
    }
}

struct MemoryCursor {
    documents: Arc<Vec<DocumentSnapshot>>,
    position: usize,
    failure_at: Option<Etag>,
    stall_at: Option<Etag>,
    stalled: Arc<Notify>,
    released: Arc<AtomicUsize>,
}

#[async_trait]
impl DocumentCursor for MemoryCursor {
    async fn next(&mut self) -> Option<Result<DocumentSnapshot>> {
        let document = self.documents.get(self.position)?.clone();
        if self.failure_at == Some(document.etag) {
            return Some(Err(AuditError::stream(
                "memory://source",
                "connection reset by peer",
            )));
        }
        if self.stall_at == Some(document.etag) {
            self.stalled.notify_one();
            std::future::pending::<()>().await;
        }
        self.position += 1;
        Some(Ok(document))
    }
}

impl Drop for MemoryCursor {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Replication topology held in memory.
///
/// `with_destination` feeds the per-destination strategy, `with_stats` the
/// aggregated one.
#[derive(Debug, Clone, Default)]
pub struct MemoryReplicationStatus {
    source: String,
    configured: Option<Vec<DestinationConfig>>,
    acknowledged: HashMap<String, Option<String>>,
    unreachable: HashSet<String>,
    stats: Vec<DestinationStats>,
    info_unavailable: bool,
}

impl MemoryReplicationStatus {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    fn configure(&mut self, url: &str, disabled: bool) {
        self.configured
            .get_or_insert_with(Vec::new)
            .push(DestinationConfig {
                url: url.to_string(),
                database: None,
                disabled,
            });
    }

    pub fn with_destination(mut self, url: &str, last_document_etag: Option<&str>) -> Self {
        self.configure(url, false);
        self.acknowledged
            .insert(url.to_string(), last_document_etag.map(str::to_string));
        self
    }

    pub fn with_disabled_destination(mut self, url: &str) -> Self {
        self.configure(url, true);
        self
    }

    pub fn with_unreachable_destination(mut self, url: &str) -> Self {
        self.configure(url, false);
        self.unreachable.insert(url.to_string());
        self
    }

    pub fn with_stats(mut self, url: &str, last_replicated_etag: Option<&str>) -> Self {
        self.stats.push(DestinationStats {
            url: url.to_string(),
            last_replicated_etag: last_replicated_etag.map(str::to_string),
        });
        self
    }

    pub fn with_info_unavailable(mut self) -> Self {
        self.info_unavailable = true;
        self
    }
}

#[async_trait]
impl ReplicationStatus for MemoryReplicationStatus {
    async fn load_destinations(&self) -> Result<Option<ReplicationDestinations>> {
        Ok(self
            .configured
            .as_ref()
            .map(|destinations| ReplicationDestinations {
                source: self.source.clone(),
                destinations: destinations.clone(),
            }))
    }

    async fn last_acknowledged(
        &self,
        destination: &Destination,
        source_id: &str,
    ) -> Result<LastAcknowledged> {
        let url = destination.database_url();
        if self.unreachable.contains(&url) {
            return Err(AuditError::connection(url, "connection refused"));
        }
        if source_id != self.source {
            return Ok(LastAcknowledged::default());
        }
        Ok(LastAcknowledged {
            last_document_etag: self.acknowledged.get(&url).cloned().flatten(),
        })
    }

    async fn replication_info(&self) -> Result<Vec<DestinationStats>> {
        if self.info_unavailable {
            return Err(AuditError::connection(
                "memory://source/replication/info",
                "service unavailable",
            ));
        }
        Ok(self.stats.clone())
    }
}

/// Report sink collecting rows in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Vec<ReportRecord>,
    flushes: usize,
    fail_after: Option<usize>,
}

impl MemorySink {
    /// A sink that accepts `count` rows and fails on the next one.
    pub fn failing_after(count: usize) -> Self {
        Self {
            fail_after: Some(count),
            ..Self::default()
        }
    }

    pub fn records(&self) -> &[ReportRecord] {
        &self.records
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }
}

impl ReportSink for MemorySink {
    fn write_record(&mut self, record: ReportRecord) -> Result<()> {
        if self.fail_after == Some(self.records.len()) {
            return Err(AuditError::Output("disk full".to_string()));
        }
        self.records.push(record);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }
}
