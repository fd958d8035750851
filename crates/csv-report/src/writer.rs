//! CSV report writer.

use crate::error::ReportError;
use audit_core::{ReportRecord, ReportSink};
use csv::{Writer, WriterBuilder};
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

/// Default buffer size for the report file.
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Rows between two flushes when streaming.
pub const DEFAULT_FLUSH_EVERY: usize = 1000;

/// When rows reach the underlying writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitStrategy {
    /// Write every row as it arrives; flush after the first row and then
    /// every `flush_every` rows.
    Streaming { flush_every: usize },
    /// Hold every row in memory and write them all when the report is
    /// finished.
    Buffered,
}

impl Default for EmitStrategy {
    fn default() -> Self {
        Self::Streaming {
            flush_every: DEFAULT_FLUSH_EVERY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CsvReportOptions {
    /// Write the `Id,Etag,EntityName,DestinationUrl` header line.
    pub include_header: bool,
    pub strategy: EmitStrategy,
}

impl Default for CsvReportOptions {
    fn default() -> Self {
        Self {
            include_header: true,
            strategy: EmitStrategy::default(),
        }
    }
}

/// Metrics from a finished report.
#[derive(Debug, Clone, Default)]
pub struct ReportMetrics {
    /// Data rows written, header excluded.
    pub rows_written: u64,
    pub flushes: u64,
    /// Report file, when writing to a file.
    pub path: Option<PathBuf>,
    /// Size of the report file in bytes.
    pub file_size_bytes: u64,
}

/// File name of the report for a source database.
///
/// Path separators and other characters that are not allowed in file names
/// are replaced by `_`.
pub fn report_file_name(database: &str) -> String {
    let sanitized: String = database
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect();
    format!("Not-yet-replicated-at-{sanitized}.csv")
}

/// Writes report records as CSV rows to any writer.
pub struct CsvReportWriter<W: Write> {
    writer: Writer<W>,
    options: CsvReportOptions,
    pending: Vec<ReportRecord>,
    rows_written: u64,
    flushes: u64,
}

impl<W: Write> CsvReportWriter<W> {
    pub fn new(inner: W, options: CsvReportOptions) -> Result<Self, ReportError> {
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(inner);
        if options.include_header {
            writer.write_record(ReportRecord::HEADERS)?;
        }

        Ok(Self {
            writer,
            options,
            pending: Vec::new(),
            rows_written: 0,
            flushes: 0,
        })
    }

    /// Rows written to the underlying writer so far.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Rows held back by the buffered strategy.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }

    fn write_row(&mut self, record: &ReportRecord) -> Result<(), ReportError> {
        self.writer.write_record(record.to_row())?;
        self.rows_written += 1;
        Ok(())
    }

    fn flush_rows(&mut self) -> Result<(), ReportError> {
        self.writer.flush()?;
        self.flushes += 1;
        debug!("Flushed report at {} rows", self.rows_written);
        Ok(())
    }

    /// Write pending rows, flush and hand back the underlying writer.
    pub fn into_inner(mut self) -> Result<(W, ReportMetrics), ReportError> {
        let pending = std::mem::take(&mut self.pending);
        for record in &pending {
            self.write_row(record)?;
        }
        self.flush_rows()?;

        let metrics = ReportMetrics {
            rows_written: self.rows_written,
            flushes: self.flushes,
            ..ReportMetrics::default()
        };
        let inner = self
            .writer
            .into_inner()
            .map_err(|e| ReportError::Io(std::io::Error::other(e.to_string())))?;
        Ok((inner, metrics))
    }

    /// Write pending rows and flush.
    pub fn finish(self) -> Result<ReportMetrics, ReportError> {
        self.into_inner().map(|(_, metrics)| metrics)
    }
}

impl<W: Write + Send> ReportSink for CsvReportWriter<W> {
    fn write_record(&mut self, record: ReportRecord) -> audit_core::Result<()> {
        match self.options.strategy {
            EmitStrategy::Streaming { flush_every } => {
                self.write_row(&record)?;
                let flush_every = flush_every.max(1) as u64;
                if (self.rows_written - 1) % flush_every == 0 {
                    self.flush_rows()?;
                }
            }
            EmitStrategy::Buffered => self.pending.push(record),
        }
        Ok(())
    }

    fn flush(&mut self) -> audit_core::Result<()> {
        // Buffered rows are only written by `into_inner`.
        if let EmitStrategy::Streaming { .. } = self.options.strategy {
            self.flush_rows()?;
        }
        Ok(())
    }
}
