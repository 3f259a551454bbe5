//! Metric artifacts written alongside a run: the streamed CSV and JSON logs,
//! the distribution table and the SQLite export.
mod distribution;
mod format;
mod forward;
mod metric_csv;
mod metric_json;
mod sqlite;


pub use distribution::write_distribution_csv;
pub use forward::{ForwardingSink, StreamOutputs, spawn_metric_writer};
pub use metric_csv::MetricCsvWriter;
pub use metric_json::MetricJsonWriter;
pub use sqlite::export_sqlite;
