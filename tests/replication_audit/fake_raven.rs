//! Minimal RavenDB 3.x HTTP surface for end-to-end runs.
//!
//! A source server serves statistics, documents, the replication
//! configuration and replication statistics of one database. Destination
//! servers only answer the last acknowledged etag query.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use raven_etag::Etag;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;

pub const SOURCE_DATABASE: &str = "Shop";
pub const SOURCE_ID: &str = "5a1e7c40-0000-4d1c-9000-00000000a11d";
pub const DESTINATION_DATABASE: &str = "Replica";

/// Nothing listens on port 9 of the loopback interface.
pub const UNREACHABLE_URL: &str = "http://127.0.0.1:9";

pub fn etag(changes: u64) -> Etag {
    Etag::new(0x0100_0000_0000_0001, changes)
}

/// Documents of the source, in etag order.
pub fn scenario_documents() -> Vec<(String, Etag)> {
    vec![
        ("Raven/Config".to_string(), etag(1)),
        ("orders/1".to_string(), etag(2)),
        ("orders/2".to_string(), etag(3)),
    ]
}

#[derive(Clone, Default)]
pub struct SourceState {
    pub documents: Vec<(String, Etag)>,
    /// `(server url, database)` entries of the replication configuration.
    pub destinations: Vec<(String, String)>,
    /// `(destination url, last replicated etag)` entries of the replication
    /// statistics.
    pub stats: Vec<(String, Option<Etag>)>,
    /// When set, every document page after the first is never answered;
    /// the notifier fires when the second page is requested.
    pub stall_after_first_page: Option<Arc<Notify>>,
    pub page_requests: Arc<AtomicUsize>,
}

async fn stats(State(state): State<Arc<SourceState>>) -> Json<Value> {
    let last = state
        .documents
        .iter()
        .map(|(_, e)| *e)
        .max()
        .unwrap_or(Etag::EMPTY);
    Json(json!({ "LastDocEtag": last.to_string(), "CountOfDocuments": state.documents.len() }))
}

async fn docs(
    State(state): State<Arc<SourceState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let request = state.page_requests.fetch_add(1, Ordering::SeqCst);
    if let Some(stalled) = state.stall_after_first_page.as_ref().filter(|_| request > 0) {
        stalled.notify_one();
        std::future::pending::<()>().await;
    }

    let after = params
        .get("etag")
        .and_then(|e| Etag::parse(e).ok())
        .unwrap_or(Etag::EMPTY);
    let page_size: usize = params
        .get("pageSize")
        .and_then(|s| s.parse().ok())
        .unwrap_or(25);

    let page: Vec<Value> = state
        .documents
        .iter()
        .filter(|(_, e)| *e > after)
        .take(page_size)
        .map(|(key, e)| {
            let mut metadata = json!({ "@id": key, "@etag": e.to_string() });
            if !key.starts_with("Raven/") {
                metadata["Raven-Entity-Name"] = json!("Orders");
            }
            json!({ "@metadata": metadata })
        })
        .collect();
    Json(Value::Array(page))
}

async fn replication_destinations(State(state): State<Arc<SourceState>>) -> Response {
    if state.destinations.is_empty() {
        return StatusCode::NOT_FOUND.into_response();
    }
    let destinations: Vec<Value> = state
        .destinations
        .iter()
        .map(|(url, database)| json!({ "Url": url, "Database": database, "Disabled": false }))
        .collect();
    Json(json!({ "Destinations": destinations, "Source": SOURCE_ID })).into_response()
}

async fn replication_info(State(state): State<Arc<SourceState>>) -> Json<Value> {
    let stats: Vec<Value> = state
        .stats
        .iter()
        .map(|(url, last)| {
            json!({ "Url": url, "LastReplicatedEtag": last.map(|e| e.to_string()) })
        })
        .collect();
    Json(json!({ "Stats": stats }))
}

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Start a source server; returns its base url.
pub async fn start_source(state: SourceState) -> String {
    let app = Router::new()
        .route(&format!("/databases/{SOURCE_DATABASE}/stats"), get(stats))
        .route(&format!("/databases/{SOURCE_DATABASE}/docs"), get(docs))
        .route(
            &format!("/databases/{SOURCE_DATABASE}/docs/Raven/Replication/Destinations"),
            get(replication_destinations),
        )
        .route(
            &format!("/databases/{SOURCE_DATABASE}/replication/info"),
            get(replication_info),
        )
        .with_state(Arc::new(state));
    serve(app).await
}

/// Start a destination that acknowledged `last` from the source.
pub async fn start_destination(last: Etag) -> String {
    let app = Router::new().route(
        &format!("/databases/{DESTINATION_DATABASE}/replication/lastEtag"),
        get(move |Query(params): Query<HashMap<String, String>>| async move {
            if params.get("dbid").map(String::as_str) != Some(SOURCE_ID) {
                return (StatusCode::BAD_REQUEST, "unknown source").into_response();
            }
            Json(json!({ "LastDocumentEtag": last.to_string() })).into_response()
        }),
    );
    serve(app).await
}
