//! Paged document cursor.
//!
//! Walks the documents of a database in etag order, one page at a time:
//!
//! ```text
//! GET /docs?etag=E0&pageSize=N  ->  [d1 .. dN]
//! GET /docs?etag=dN&pageSize=N  ->  [..]
//! GET /docs?etag=..&pageSize=N  ->  []          (done)
//! ```
//!
//! No state is kept on the server between pages, so dropping the cursor
//! releases everything. At most one page is held in memory.

use crate::wire::document_snapshot;
use async_trait::async_trait;
use audit_core::{AuditError, DocumentCursor, DocumentSnapshot, Result};
use raven_etag::Etag;
use reqwest::Client;
use serde_json::Value;
use std::collections::VecDeque;

pub struct PagedDocumentCursor {
    http: Client,
    docs_url: String,
    page_size: usize,
    /// Etag the next page starts after.
    next_etag: Etag,
    page: VecDeque<DocumentSnapshot>,
    exhausted: bool,
}

impl PagedDocumentCursor {
    pub fn new(http: Client, docs_url: String, from: Etag, page_size: usize) -> Self {
        Self {
            http,
            docs_url,
            page_size: page_size.max(1),
            next_etag: from,
            page: VecDeque::new(),
            exhausted: false,
        }
    }

    async fn fetch_page(&mut self) -> Result<()> {
        let etag = self.next_etag.to_string();
        let page_size = self.page_size.to_string();
        tracing::debug!("Fetching documents after {etag} from {}", self.docs_url);

        let response = self
            .http
            .get(&self.docs_url)
            .query(&[("etag", etag.as_str()), ("pageSize", page_size.as_str())])
            .send()
            .await
            .map_err(|e| AuditError::stream(&self.docs_url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuditError::stream(
                &self.docs_url,
                format!("server returned status {status}"),
            ));
        }

        let entries: Vec<Value> = response
            .json()
            .await
            .map_err(|e| AuditError::stream(&self.docs_url, format!("unexpected response: {e}")))?;

        let mut advanced = false;
        for entry in &entries {
            if let Some(document) = document_snapshot(entry, &self.docs_url)? {
                if document.etag.is_greater_than(&self.next_etag) {
                    self.next_etag = document.etag;
                    advanced = true;
                }
                self.page.push_back(document);
            }
        }

        // The server may cap the page size below ours, so a short page is
        // not the last one. Only an empty page ends the stream; a page that
        // does not move the etag forward would be served again forever.
        if entries.is_empty() || !advanced {
            self.exhausted = true;
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentCursor for PagedDocumentCursor {
    async fn next(&mut self) -> Option<Result<DocumentSnapshot>> {
        loop {
            if let Some(document) = self.page.pop_front() {
                return Some(Ok(document));
            }
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.fetch_page().await {
                self.exhausted = true;
                self.page.clear();
                return Some(Err(e));
            }
        }
    }
}
