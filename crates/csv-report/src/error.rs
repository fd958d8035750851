//! Error types for the CSV report.

use audit_core::AuditError;
use thiserror::Error;

/// Errors that can occur while writing the report.
#[derive(Error, Debug)]
pub enum ReportError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<ReportError> for AuditError {
    fn from(error: ReportError) -> Self {
        AuditError::Output(error.to_string())
    }
}
