//! Replication gap detection core.
//!
//! Given a source database and its replication destinations, finds the
//! documents each destination has not acknowledged yet.
//!
//! # Architecture
//!
//! - [`resolver`] turns the source's replication status into one
//!   `(destination, last acknowledged etag)` pair per destination
//! - [`scanner`] classifies a destination against the source high-water mark
//!   and streams the documents it is missing
//! - [`Auditor`] runs both, fanning lagging destinations out to a bounded set
//!   of workers that feed a single report writer
//!
//! The store session, replication status endpoint and report output are
//! collaborators behind the traits in [`traits`]. `ravendb-client` provides
//! the HTTP implementations, `csv-report` the CSV sink and [`testing`]
//! in-memory doubles.

mod audit;
mod error;
pub mod resolver;
pub mod scanner;
mod summary;
pub mod testing;
pub mod traits;
mod types;

pub use audit::{AuditOptions, Auditor, DEFAULT_CHANNEL_CAPACITY, DEFAULT_INTERNAL_PREFIX};
pub use error::{AuditError, Result};
pub use resolver::{resolve_destinations, Resolution, ResolveStrategy};
pub use scanner::{classify, Classification};
pub use summary::{AuditSummary, DestinationAudit, DestinationState};
pub use traits::{DocumentCursor, DocumentStore, ReplicationStatus, ReportSink};
pub use types::{
    Destination, DestinationConfig, DestinationPosition, DestinationStats, DocumentSnapshot,
    LastAcknowledged, ReplicationDestinations, ReportRecord, SourceStatistics,
};

pub use raven_etag::{Etag, EtagParseError};
