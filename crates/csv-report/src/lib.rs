//! CSV output for replication audits.
//!
//! One file per audit run, named after the source database:
//!
//! ```text
//! Not-yet-replicated-at-Northwind.csv
//!
//! Id,Etag,EntityName,DestinationUrl
//! orders/1,01000000-0000-0001-0000-000000000002,Orders,http://replica:8080
//! ```
//!
//! # Example
//!
//! ```ignore
//! use csv_report::{CsvReportOptions, ReportFile};
//!
//! let mut report = ReportFile::create(".", "Northwind", CsvReportOptions::default())?;
//! match auditor.run(&mut report).await {
//!     Ok(_) => {
//!         report.finish()?;
//!     }
//!     Err(_) => report.discard(),
//! }
//! ```
//!
//! [`CsvReportWriter`] writes the same rows to any `io::Write`.

mod error;
mod file;
mod writer;

pub use error::ReportError;
pub use file::ReportFile;
pub use writer::{
    report_file_name, CsvReportOptions, CsvReportWriter, EmitStrategy, ReportMetrics,
    DEFAULT_BUFFER_SIZE, DEFAULT_FLUSH_EVERY,
};
