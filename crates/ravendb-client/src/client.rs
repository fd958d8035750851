//! HTTP session against a RavenDB 3.x server.

use crate::config::ClientOptions;
use crate::cursor::PagedDocumentCursor;
use crate::wire::{
    DatabaseStatistics, ReplicationDocument, ReplicationStatistics, SourceReplicationInformation,
};
use async_trait::async_trait;
use audit_core::{
    AuditError, Destination, DestinationStats, DocumentCursor, DocumentStore, LastAcknowledged,
    ReplicationDestinations, ReplicationStatus, Result, SourceStatistics,
};
use raven_etag::Etag;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

/// Document id of the stored replication configuration.
const REPLICATION_DESTINATIONS_ID: &str = "Raven/Replication/Destinations";

/// Client for one database on a RavenDB server.
///
/// Implements both [`DocumentStore`] and [`ReplicationStatus`]; destinations
/// are reached with the same HTTP client.
#[derive(Debug, Clone)]
pub struct RavenClient {
    http: Client,
    server_url: String,
    database: String,
    options: ClientOptions,
}

impl RavenClient {
    pub fn new(
        server_url: impl Into<String>,
        database: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self> {
        let server_url = server_url.into().trim_end_matches('/').to_string();
        let http = Client::builder()
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| AuditError::connection(&server_url, e))?;

        Ok(Self {
            http,
            server_url,
            database: database.into(),
            options,
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// `<server>/databases/<database>`, how destinations know this source.
    pub fn database_url(&self) -> String {
        format!("{}/databases/{}", self.server_url, self.database)
    }

    /// GET a JSON document. `Ok(None)` on 404.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>> {
        tracing::debug!("GET {url}");

        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| AuditError::connection(url, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(AuditError::connection(
                url,
                format!("server returned status {status}"),
            ));
        }

        let body = response
            .json::<T>()
            .await
            .map_err(|e| AuditError::connection(url, format!("unexpected response: {e}")))?;
        Ok(Some(body))
    }

    async fn get_required<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T> {
        self.get_json(url, query)
            .await?
            .ok_or_else(|| AuditError::connection(url, "server returned status 404 Not Found"))
    }
}

#[async_trait]
impl DocumentStore for RavenClient {
    async fn statistics(&self) -> Result<SourceStatistics> {
        let url = format!("{}/stats", self.database_url());
        let statistics: DatabaseStatistics = self.get_required(&url, &[]).await?;

        let last_doc_etag = match statistics.last_doc_etag.as_deref() {
            Some(token) => Etag::parse(token).map_err(|e| AuditError::parse(&url, e))?,
            None => Etag::EMPTY,
        };
        Ok(SourceStatistics { last_doc_etag })
    }

    async fn open_document_stream(&self, from: Etag) -> Result<Box<dyn DocumentCursor>> {
        let docs_url = format!("{}/docs", self.database_url());
        Ok(Box::new(PagedDocumentCursor::new(
            self.http.clone(),
            docs_url,
            from,
            self.options.page_size,
        )))
    }
}

#[async_trait]
impl ReplicationStatus for RavenClient {
    async fn load_destinations(&self) -> Result<Option<ReplicationDestinations>> {
        let url = format!("{}/docs/{}", self.database_url(), REPLICATION_DESTINATIONS_ID);
        let document: Option<ReplicationDocument> = self.get_json(&url, &[]).await?;
        Ok(document.map(ReplicationDestinations::from))
    }

    async fn last_acknowledged(
        &self,
        destination: &Destination,
        source_id: &str,
    ) -> Result<LastAcknowledged> {
        let url = format!("{}/replication/lastEtag", destination.database_url());
        let source_url = self.database_url();
        let information: SourceReplicationInformation = self
            .get_required(&url, &[("from", source_url.as_str()), ("dbid", source_id)])
            .await?;

        Ok(LastAcknowledged {
            last_document_etag: information.last_document_etag,
        })
    }

    async fn replication_info(&self) -> Result<Vec<DestinationStats>> {
        let url = format!("{}/replication/info", self.database_url());
        let statistics: ReplicationStatistics = self.get_required(&url, &[]).await?;
        Ok(statistics.stats.into_iter().map(DestinationStats::from).collect())
    }
}
