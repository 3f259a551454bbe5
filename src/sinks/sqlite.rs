use std::path::Path;

use tokio_rusqlite::Connection;
use tracing::debug;

use crate::error::SinkError;
use crate::metrics::Metric;

use super::format::timestamp;

/// Rows inserted per transaction.
const DB_FLUSH_SIZE: usize = 500;

const CREATE_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS metrics (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL,
        scenario TEXT NOT NULL,
        target_type TEXT NOT NULL,
        operation TEXT NOT NULL,
        target_name TEXT NOT NULL,
        service_code TEXT NOT NULL,
        success INTEGER NOT NULL,
        rtt_ms REAL NOT NULL,
        jitter_ms REAL NOT NULL,
        status INTEGER NOT NULL,
        error TEXT NOT NULL,
        outcome TEXT NOT NULL,
        expected_outcome TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_metrics_scenario ON metrics(scenario);
    CREATE INDEX IF NOT EXISTS idx_metrics_operation ON metrics(operation);";

/// Appends every metric to the `metrics` table of the database at `path`,
/// creating the schema when missing. Returns the number of inserted rows.
///
/// # Errors
///
/// Returns an error when the database cannot be opened or a batch insert
/// fails.
pub async fn export_sqlite(path: &Path, metrics: Vec<Metric>) -> Result<u64, SinkError> {
    let conn = Connection::open(path).await.map_err(sqlite_error)?;
    conn.call(|conn| {
        conn.execute_batch(CREATE_SCHEMA)?;
        Ok(())
    })
    .await
    .map_err(sqlite_error)?;

    let mut inserted: u64 = 0;
    let mut pending = metrics;
    while !pending.is_empty() {
        let rest = pending.split_off(pending.len().min(DB_FLUSH_SIZE));
        let batch = std::mem::replace(&mut pending, rest);
        let rows = u64::try_from(batch.len()).unwrap_or(u64::MAX);
        insert_batch(&conn, batch).await?;
        inserted = inserted.saturating_add(rows);
    }
    debug!("Exported {} metrics to {}", inserted, path.display());
    Ok(inserted)
}

async fn insert_batch(conn: &Connection, batch: Vec<Metric>) -> Result<(), SinkError> {
    conn.call(move |conn| {
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO metrics (timestamp, scenario, target_type, operation, target_name,
                    service_code, success, rtt_ms, jitter_ms, status, error, outcome, expected_outcome)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;
            for metric in &batch {
                stmt.execute(rusqlite::params![
                    timestamp(metric),
                    metric.scenario,
                    metric.target_type.as_str(),
                    metric.operation.as_str(),
                    metric.target_name,
                    metric.service_code,
                    i64::from(u8::from(metric.success)),
                    metric.rtt_ms,
                    metric.jitter_ms,
                    i64::from(metric.status),
                    metric.error,
                    metric.outcome.as_str(),
                    metric.expected_outcome.map(|expected| expected.as_str()),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    })
    .await
    .map_err(sqlite_error)
}

const fn sqlite_error(source: tokio_rusqlite::Error) -> SinkError {
    SinkError::Sqlite { source }
}
