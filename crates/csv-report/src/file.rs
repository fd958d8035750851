//! Report file on disk.
//!
//! Rows go to a hidden `.Not-yet-replicated-at-<db>.csv.<random>.partial`
//! file in the output directory. [`ReportFile::finish`] renames it over the
//! final path, so a run that fails before finishing leaves an existing
//! report untouched.

use crate::error::ReportError;
use crate::writer::{
    report_file_name, CsvReportOptions, CsvReportWriter, ReportMetrics, DEFAULT_BUFFER_SIZE,
};
use audit_core::{ReportRecord, ReportSink};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, info};

pub struct ReportFile {
    writer: CsvReportWriter<BufWriter<NamedTempFile>>,
    path: PathBuf,
}

impl ReportFile {
    /// Start the report for `database` in `dir`.
    pub fn create<P: AsRef<Path>>(
        dir: P,
        database: &str,
        options: CsvReportOptions,
    ) -> Result<Self, ReportError> {
        let dir = dir.as_ref();
        let file_name = report_file_name(database);
        let path = dir.join(&file_name);

        let partial = Builder::new()
            .prefix(&format!(".{file_name}."))
            .suffix(".partial")
            .tempfile_in(dir)?;
        debug!("Writing report to '{}'", partial.path().display());

        let buf_writer = BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, partial);
        let writer = CsvReportWriter::new(buf_writer, options)?;
        Ok(Self { writer, path })
    }

    /// Where the report ends up once finished.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File holding the rows until the report is finished.
    pub fn partial_path(&self) -> &Path {
        self.writer.get_ref().get_ref().path()
    }

    pub fn rows_written(&self) -> u64 {
        self.writer.rows_written()
    }

    /// Write pending rows and move the report to its final path, replacing
    /// any earlier report.
    pub fn finish(self) -> Result<ReportMetrics, ReportError> {
        let (buf_writer, mut metrics) = self.writer.into_inner()?;
        let partial = buf_writer
            .into_inner()
            .map_err(|e| ReportError::Io(e.into_error()))?;
        partial
            .persist(&self.path)
            .map_err(|e| ReportError::Io(e.error))?;

        metrics.file_size_bytes = std::fs::metadata(&self.path)?.len();
        info!(
            "Report written to '{}': {} rows",
            self.path.display(),
            metrics.rows_written
        );
        metrics.path = Some(self.path);
        Ok(metrics)
    }

    /// Throw the rows away; an existing report at [`ReportFile::path`] is
    /// left as it was.
    pub fn discard(self) {
        debug!(
            "Discarding report '{}' after {} rows",
            self.partial_path().display(),
            self.rows_written()
        );
    }
}

impl ReportSink for ReportFile {
    fn write_record(&mut self, record: ReportRecord) -> audit_core::Result<()> {
        self.writer.write_record(record)
    }

    fn flush(&mut self) -> audit_core::Result<()> {
        ReportSink::flush(&mut self.writer)
    }
}
