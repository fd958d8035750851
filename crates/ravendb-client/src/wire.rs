//! JSON shapes of the RavenDB 3.x responses the audit reads.
//!
//! Only the fields the audit needs are declared; everything else in the
//! responses is ignored.

use audit_core::{
    AuditError, DestinationConfig, DestinationStats, DocumentSnapshot, ReplicationDestinations,
};
use raven_etag::Etag;
use serde::Deserialize;
use serde_json::Value;

/// Metadata key holding the document id.
const METADATA_ID: &str = "@id";
const METADATA_ETAG: &str = "@etag";
/// Metadata key holding the collection (entity) name.
const METADATA_ENTITY_NAME: &str = "Raven-Entity-Name";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct DatabaseStatistics {
    #[serde(default)]
    pub last_doc_etag: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ReplicationDocument {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub destinations: Vec<ReplicationDestination>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ReplicationDestination {
    pub url: String,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

impl From<ReplicationDocument> for ReplicationDestinations {
    fn from(document: ReplicationDocument) -> Self {
        Self {
            source: document.source,
            destinations: document
                .destinations
                .into_iter()
                .map(|d| DestinationConfig {
                    url: d.url,
                    database: d.database,
                    disabled: d.disabled,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct SourceReplicationInformation {
    #[serde(default)]
    pub last_document_etag: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ReplicationStatistics {
    #[serde(default)]
    pub stats: Vec<ReplicationDestinationStats>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ReplicationDestinationStats {
    pub url: String,
    #[serde(default)]
    pub last_replicated_etag: Option<String>,
}

impl From<ReplicationDestinationStats> for DestinationStats {
    fn from(stats: ReplicationDestinationStats) -> Self {
        Self {
            url: stats.url,
            last_replicated_etag: stats.last_replicated_etag,
        }
    }
}

/// Turn one entry of a document page into a snapshot.
///
/// `Ok(None)` for null entries, which the server may emit for documents
/// deleted while the page was read.
pub(crate) fn document_snapshot(entry: &Value, origin: &str) -> Result<Option<DocumentSnapshot>, AuditError> {
    if entry.is_null() {
        return Ok(None);
    }

    let metadata = entry
        .get("@metadata")
        .and_then(Value::as_object)
        .ok_or_else(|| AuditError::stream(origin, "document without @metadata"))?;

    let key = metadata
        .get(METADATA_ID)
        .and_then(Value::as_str)
        .ok_or_else(|| AuditError::stream(origin, "document metadata without @id"))?;

    let etag_token = metadata
        .get(METADATA_ETAG)
        .and_then(Value::as_str)
        .ok_or_else(|| AuditError::stream(origin, format!("document {key} without @etag")))?;
    let etag = Etag::parse(etag_token)
        .map_err(|e| AuditError::stream(origin, format!("document {key}: {e}")))?;

    let entity_name = metadata.get(METADATA_ENTITY_NAME).and_then(Value::as_str);

    Ok(Some(DocumentSnapshot::new(key, etag, entity_name)))
}
