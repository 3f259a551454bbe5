use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::error::SinkError;
use crate::metrics::{BUCKET_LABELS, DistributionRow};

use super::format::{millis, write_row};

const ARTIFACT: &str = "distribution csv";

const STAT_COLUMNS: [&str; 13] = [
    "scope",
    "scenario",
    "operation",
    "series",
    "count",
    "samples",
    "min_ms",
    "max_ms",
    "avg_ms",
    "p50_ms",
    "p90_ms",
    "p95_ms",
    "p99_ms",
];

fn row_fields(row: &DistributionRow) -> Vec<String> {
    let stats = &row.stats;
    let mut fields = vec![
        row.scope.as_str().to_owned(),
        row.scenario.clone(),
        row.operation.clone(),
        row.series.to_owned(),
        row.count.to_string(),
        stats.samples.to_string(),
        millis(stats.min_ms),
        millis(stats.max_ms),
        millis(stats.avg_ms),
        millis(stats.p50_ms),
        millis(stats.p90_ms),
        millis(stats.p95_ms),
        millis(stats.p99_ms),
    ];
    fields.extend(row.buckets().iter().map(u64::to_string));
    fields
}

/// Writes the finalized distribution table: fixed statistic columns followed
/// by one column per histogram bucket.
///
/// # Errors
///
/// Returns an error when the file cannot be created or written.
pub async fn write_distribution_csv(path: &Path, rows: &[DistributionRow]) -> Result<(), SinkError> {
    let mut output = String::new();
    write_row(&mut output, STAT_COLUMNS.iter().chain(BUCKET_LABELS.iter()))?;
    for row in rows {
        write_row(&mut output, row_fields(row))?;
    }

    let file = File::create(path).await.map_err(write_error)?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(output.as_bytes())
        .await
        .map_err(write_error)?;
    writer.flush().await.map_err(write_error)?;
    Ok(())
}

const fn write_error(source: std::io::Error) -> SinkError {
    SinkError::Write {
        artifact: ARTIFACT,
        source,
    }
}
