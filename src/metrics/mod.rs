//! Streaming metrics: the per-operation record, the outcome classifier, the
//! thread-safe sink with its incremental aggregate, and the snapshot,
//! report and distribution views built from it.
mod aggregate;
mod distribution;
mod histogram;
mod outcome;
mod percentiles;
mod report;
mod sink;
mod summary;
mod types;

#[cfg(test)]
mod tests;

pub use aggregate::{Breakdown, RunningStats};
pub use distribution::{DistributionRow, DistributionScope, distribution_table};
pub use histogram::{BUCKET_BOUNDS_MS, BUCKET_LABELS, BUCKET_COUNT, LatencyHistogram};
pub use outcome::{classify_outcome, is_connection_failure, is_timeout};
pub use percentiles::{P50, P90, P95, P99, nearest_rank};
pub use report::render_summary;
pub use sink::{MetricsSink, StreamingSink};
pub use summary::{LatencyStats, Summary};
pub use types::{ExpectedOutcome, Metric, OperationKind, Outcome, duration_ms};
