use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::error::SinkError;
use crate::metrics::Metric;

use super::format::{METRIC_COLUMNS, metric_fields, write_row};

const ARTIFACT: &str = "metrics csv";

/// Streams one CSV row per metric behind a fixed header.
#[derive(Debug)]
pub struct MetricCsvWriter {
    writer: Option<BufWriter<File>>,
    line: String,
    rows: u64,
}

impl MetricCsvWriter {
    /// Creates (or truncates) `path` and writes the header row.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be created or written.
    pub async fn create(path: &Path) -> Result<Self, SinkError> {
        let file = File::create(path).await.map_err(write_error)?;
        let mut writer = BufWriter::new(file);
        let mut line = String::new();
        write_row(&mut line, METRIC_COLUMNS)?;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(write_error)?;
        line.clear();
        Ok(Self {
            writer: Some(writer),
            line,
            rows: 0,
        })
    }

    /// # Errors
    ///
    /// Returns an error when the row cannot be written or the writer was
    /// already finished.
    pub async fn write(&mut self, metric: &Metric) -> Result<(), SinkError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or(SinkError::AlreadyFinished { artifact: ARTIFACT })?;
        self.line.clear();
        write_row(&mut self.line, metric_fields(metric))?;
        writer
            .write_all(self.line.as_bytes())
            .await
            .map_err(write_error)?;
        self.rows = self.rows.saturating_add(1);
        Ok(())
    }

    /// Flushes buffered rows and closes the file. Returns the row count.
    ///
    /// # Errors
    ///
    /// Returns an error when the flush fails or the writer was already
    /// finished.
    pub async fn finish(&mut self) -> Result<u64, SinkError> {
        let mut writer = self
            .writer
            .take()
            .ok_or(SinkError::AlreadyFinished { artifact: ARTIFACT })?;
        writer.flush().await.map_err(write_error)?;
        Ok(self.rows)
    }
}

const fn write_error(source: std::io::Error) -> SinkError {
    SinkError::Write {
        artifact: ARTIFACT,
        source,
    }
}
