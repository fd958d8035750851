//! Client configuration.

use std::time::Duration;

/// Documents fetched per page of the document stream.
pub const DEFAULT_PAGE_SIZE: usize = 1024;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Timeout applied to every request, source and destinations alike.
    pub request_timeout: Duration,
    /// Upper bound on the documents a cursor holds at once.
    pub page_size: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}
