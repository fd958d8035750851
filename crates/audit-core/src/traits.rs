//! Collaborator seams.
//!
//! The audit only needs a handful of calls from the document store and the
//! report output. Implementations live in other crates:
//!
//! - `ravendb-client` - [`DocumentStore`] and [`ReplicationStatus`] over HTTP
//! - `csv-report` - [`ReportSink`] writing CSV
//! - [`crate::testing`] - in-memory doubles for all four

use crate::error::Result;
use crate::types::{
    Destination, DestinationStats, DocumentSnapshot, LastAcknowledged, ReplicationDestinations,
    ReportRecord, SourceStatistics,
};
use async_trait::async_trait;
use raven_etag::Etag;

/// Session against the source database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Current statistics of the source, including its last document etag.
    async fn statistics(&self) -> Result<SourceStatistics>;

    /// Open a cursor over the documents written strictly after `from`,
    /// in ascending etag order.
    async fn open_document_stream(&self, from: Etag) -> Result<Box<dyn DocumentCursor>>;
}

/// Lazy pull cursor over source documents.
///
/// A cursor is consumed by one caller, front to back. It cannot rewind;
/// to start over, open a new one. Dropping it releases whatever it holds.
#[async_trait]
pub trait DocumentCursor: Send {
    /// Next document, `None` once the cursor is exhausted.
    async fn next(&mut self) -> Option<Result<DocumentSnapshot>>;
}

/// Where the replication topology and each destination's progress come from.
#[async_trait]
pub trait ReplicationStatus: Send + Sync {
    /// Load the stored replication configuration of the source.
    ///
    /// Returns `None` when the source has no replication configured.
    async fn load_destinations(&self) -> Result<Option<ReplicationDestinations>>;

    /// Ask `destination` for the last document it received from the source
    /// identified by `source_id`.
    async fn last_acknowledged(
        &self,
        destination: &Destination,
        source_id: &str,
    ) -> Result<LastAcknowledged>;

    /// Ask the source for the replication status of all its destinations in
    /// one call.
    async fn replication_info(&self) -> Result<Vec<DestinationStats>>;
}

/// Output of the audit.
///
/// Only one writer ever holds the sink, so implementations need no locking.
pub trait ReportSink: Send {
    fn write_record(&mut self, record: ReportRecord) -> Result<()>;

    fn flush(&mut self) -> Result<()>;
}
