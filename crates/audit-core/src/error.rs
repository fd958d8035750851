//! Error taxonomy for an audit run.

use raven_etag::EtagParseError;
use thiserror::Error;

/// Errors that can occur while auditing replication.
///
/// Which of these end the run depends on where they happen: a source-side
/// `Connection` error is terminal, the same error for one destination only
/// skips that destination.
#[derive(Error, Debug)]
pub enum AuditError {
    /// Bad or missing command line input.
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// A store could not be reached or answered with an error.
    #[error("Connection to '{target}' failed: {message}")]
    Connection { target: String, message: String },

    /// An etag token could not be parsed.
    #[error("Malformed etag from '{origin}': {source}")]
    Parse {
        origin: String,
        #[source]
        source: EtagParseError,
    },

    /// The document cursor failed mid-scan.
    #[error("Document stream from '{origin}' failed: {message}")]
    Stream { origin: String, message: String },

    /// The report could not be written.
    #[error("Report output error: {0}")]
    Output(String),
}

impl AuditError {
    pub fn connection(target: impl Into<String>, message: impl ToString) -> Self {
        Self::Connection {
            target: target.into(),
            message: message.to_string(),
        }
    }

    pub fn stream(origin: impl Into<String>, message: impl ToString) -> Self {
        Self::Stream {
            origin: origin.into(),
            message: message.to_string(),
        }
    }

    pub fn parse(origin: impl Into<String>, source: EtagParseError) -> Self {
        Self::Parse {
            origin: origin.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, AuditError>;
