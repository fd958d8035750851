//! RavenDB 3.x over HTTP.
//!
//! Implements the audit's store session and replication status against the
//! RavenDB 3.x REST API:
//!
//! | Call | Endpoint |
//! |---|---|
//! | statistics | `GET /databases/{db}/stats` |
//! | document stream | `GET /databases/{db}/docs?etag={etag}&pageSize={n}` |
//! | replication configuration | `GET /databases/{db}/docs/Raven/Replication/Destinations` |
//! | last etag at a destination | `GET {destination}/replication/lastEtag?from={source}&dbid={id}` |
//! | aggregated status | `GET /databases/{db}/replication/info` |
//!
//! # Example
//!
//! ```ignore
//! use audit_core::{AuditOptions, Auditor};
//! use ravendb_client::{ClientOptions, RavenClient};
//!
//! let client = RavenClient::new("http://localhost:8080", "Northwind", ClientOptions::default())?;
//! let summary = Auditor::new(&client, &client, AuditOptions::default())
//!     .run(&mut sink)
//!     .await?;
//! ```

mod client;
mod config;
mod cursor;
mod wire;

pub use client::RavenClient;
pub use config::{ClientOptions, DEFAULT_PAGE_SIZE, DEFAULT_REQUEST_TIMEOUT};
pub use cursor::PagedDocumentCursor;
