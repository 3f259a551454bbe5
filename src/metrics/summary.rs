use std::collections::BTreeMap;

use super::aggregate::{Aggregate, Breakdown, RunningStats};
use super::histogram::LatencyHistogram;
use super::percentiles::{P50, P90, P95, P99, nearest_rank, sort_samples};
use super::types::OperationKind;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatencyStats {
    pub samples: u64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub avg_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub histogram: LatencyHistogram,
}

impl LatencyStats {
    /// Combines incrementally tracked min / max / mean with percentiles and
    /// buckets recomputed from the raw samples.
    pub(crate) fn from_running(running: &RunningStats, mut samples: Vec<f64>) -> Self {
        sort_samples(&mut samples);
        Self {
            samples: running.samples(),
            min_ms: running.min(),
            max_ms: running.max(),
            avg_ms: running.mean(),
            p50_ms: nearest_rank(&samples, P50),
            p90_ms: nearest_rank(&samples, P90),
            p95_ms: nearest_rank(&samples, P95),
            p99_ms: nearest_rank(&samples, P99),
            histogram: LatencyHistogram::from_values(&samples),
        }
    }

    /// Full computation from raw samples alone.
    #[must_use]
    pub fn from_samples(samples: Vec<f64>) -> Self {
        let mut running = RunningStats::default();
        for value in &samples {
            running.push(*value);
        }
        Self::from_running(&running, samples)
    }
}

/// Aggregate view over every metric recorded up to the moment it was taken.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub total_operations: u64,
    pub successful_operations: u64,
    pub failed_operations: u64,
    pub timeouts: u64,
    pub connection_failures: u64,
    pub misclassifications: u64,
    pub rtt: LatencyStats,
    pub jitter: LatencyStats,
    pub by_operation: BTreeMap<OperationKind, Breakdown>,
    pub by_scenario: BTreeMap<String, Breakdown>,
}

impl Summary {
    pub(crate) fn build(aggregate: Aggregate, rtt_samples: Vec<f64>, jitter_samples: Vec<f64>) -> Self {
        Self {
            total_operations: aggregate.total,
            successful_operations: aggregate.successful,
            failed_operations: aggregate.failed,
            timeouts: aggregate.timeouts,
            connection_failures: aggregate.connection_failures,
            misclassifications: aggregate.misclassified,
            rtt: LatencyStats::from_running(&aggregate.rtt, rtt_samples),
            jitter: LatencyStats::from_running(&aggregate.jitter, jitter_samples),
            by_operation: aggregate.by_operation,
            by_scenario: aggregate.by_scenario,
        }
    }

    /// Success rate in hundredths of a percent.
    #[must_use]
    pub fn success_rate_x100(&self) -> u64 {
        self.successful_operations
            .saturating_mul(10_000)
            .checked_div(self.total_operations)
            .unwrap_or(0)
    }
}
