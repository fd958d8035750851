//! Data model shared by the resolver, the scanner and the collaborators.

use raven_etag::Etag;

/// A remote store that receives replicated documents from the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Server URL, printed in the report's `DestinationUrl` column.
    pub url: String,
    /// Database on that server, when the status source names one.
    pub database: Option<String>,
}

impl Destination {
    pub fn new(url: impl Into<String>, database: Option<String>) -> Self {
        Self {
            url: url.into(),
            database,
        }
    }

    /// URL of the destination database (`<url>/databases/<database>`).
    pub fn database_url(&self) -> String {
        let base = self.url.trim_end_matches('/');
        match &self.database {
            Some(database) if !database.is_empty() => format!("{base}/databases/{database}"),
            _ => base.to_string(),
        }
    }

    /// Key used to collapse duplicate destinations.
    pub(crate) fn dedup_key(&self) -> String {
        self.database_url()
    }
}

/// One destination entry of the stored replication configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationConfig {
    pub url: String,
    pub database: Option<String>,
    pub disabled: bool,
}

impl DestinationConfig {
    pub fn destination(&self) -> Destination {
        Destination::new(self.url.clone(), self.database.clone())
    }
}

/// The stored replication configuration of the source database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationDestinations {
    /// Database id of the source, sent to destinations when asking what they
    /// received from it.
    pub source: String,
    pub destinations: Vec<DestinationConfig>,
}

/// A destination's answer to "what is the last document you received from
/// this source". The token stays raw until the resolver parses it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LastAcknowledged {
    pub last_document_etag: Option<String>,
}

/// One entry of the source's aggregated replication status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationStats {
    pub url: String,
    pub last_replicated_etag: Option<String>,
}

/// Statistics of the source database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceStatistics {
    /// Etag of the most recent document write; the run's high-water mark.
    pub last_doc_etag: Etag,
}

/// The part of a source document the report needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSnapshot {
    pub key: String,
    pub etag: Etag,
    pub entity_name: Option<String>,
}

impl DocumentSnapshot {
    pub fn new(key: impl Into<String>, etag: Etag, entity_name: Option<&str>) -> Self {
        Self {
            key: key.into(),
            etag,
            entity_name: entity_name.map(str::to_string),
        }
    }
}

/// A destination paired with the last etag it acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationPosition {
    pub destination: Destination,
    pub last_acknowledged: Etag,
}

/// One report row: a document not yet replicated to a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRecord {
    pub id: String,
    pub etag: Etag,
    pub entity_name: String,
    pub destination_url: String,
}

impl ReportRecord {
    /// Column names, in row order.
    pub const HEADERS: [&'static str; 4] = ["Id", "Etag", "EntityName", "DestinationUrl"];

    pub fn from_snapshot(snapshot: DocumentSnapshot, destination: &Destination) -> Self {
        Self {
            id: snapshot.key,
            etag: snapshot.etag,
            entity_name: snapshot.entity_name.unwrap_or_default(),
            destination_url: destination.url.clone(),
        }
    }

    /// The row as it is written to the report.
    pub fn to_row(&self) -> [String; 4] {
        [
            self.id.clone(),
            self.etag.to_string(),
            self.entity_name.clone(),
            self.destination_url.clone(),
        ]
    }
}
