use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::error::SinkError;
use crate::metrics::Metric;

use super::format::{round_micros, timestamp};

const ARTIFACT: &str = "metrics json";

/// Streams metrics as a single JSON array, one record per line. The closing
/// bracket is only written by [`MetricJsonWriter::finish`].
#[derive(Debug)]
pub struct MetricJsonWriter {
    writer: Option<BufWriter<File>>,
    records: u64,
}

impl MetricJsonWriter {
    /// # Errors
    ///
    /// Returns an error when the file cannot be created or written.
    pub async fn create(path: &Path) -> Result<Self, SinkError> {
        let file = File::create(path).await.map_err(write_error)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(b"[\n").await.map_err(write_error)?;
        Ok(Self {
            writer: Some(writer),
            records: 0,
        })
    }

    /// # Errors
    ///
    /// Returns an error when the record cannot be serialized or written, or
    /// the writer was already finished.
    pub async fn write(&mut self, metric: &Metric) -> Result<(), SinkError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or(SinkError::AlreadyFinished { artifact: ARTIFACT })?;
        let record = serde_json::json!({
            "timestamp": timestamp(metric),
            "scenario": metric.scenario,
            "target_type": metric.target_type.as_str(),
            "operation": metric.operation.as_str(),
            "target_name": metric.target_name,
            "service_code": metric.service_code,
            "success": metric.success,
            "rtt_ms": round_micros(metric.rtt_ms),
            "jitter_ms": round_micros(metric.jitter_ms),
            "status": metric.status,
            "error": metric.error,
            "outcome": metric.outcome.as_str(),
            "expected_outcome": metric.expected_outcome.map(|expected| expected.as_str()),
        });
        let bytes =
            serde_json::to_vec(&record).map_err(|err| SinkError::Serialize { source: err })?;
        if self.records > 0 {
            writer.write_all(b",\n").await.map_err(write_error)?;
        }
        writer.write_all(&bytes).await.map_err(write_error)?;
        self.records = self.records.saturating_add(1);
        Ok(())
    }

    /// Closes the array, flushes and returns the record count.
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
        let tail: &[u8] = if self.records > 0 { b"\n]\n" } else { b"]\n" };
        writer.write_all(tail).await.map_err(write_error)?;
        writer.flush().await.map_err(write_error)?;
        Ok(self.records)
    }
}

const fn write_error(source: std::io::Error) -> SinkError {
    SinkError::Write {
        artifact: ARTIFACT,
        source,
    }
}
