use parking_lot::RwLock;

use super::aggregate::{Aggregate, counts_toward_jitter, counts_toward_rtt};
use super::summary::Summary;
use super::types::Metric;

/// Write side of the metrics pipeline as seen by scenarios.
pub trait MetricsSink: Send + Sync {
    fn record(&self, metric: Metric);
}

#[derive(Debug, Default)]
struct SinkState {
    metrics: Vec<Metric>,
    aggregate: Aggregate,
}

/// Append-only metric log with an incrementally maintained aggregate.
///
/// `record` and `relabel_scenario` take the write side of a single
/// readers-writer lock; `summary` and `metrics` take the read side, so a
/// snapshot reflects exactly the records appended before it.
#[derive(Debug, Default)]
pub struct StreamingSink {
    state: RwLock<SinkState>,
}

impl StreamingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, metric: Metric) {
        let mut state = self.state.write();
        state.aggregate.absorb(&metric);
        state.metrics.push(metric);
    }

    /// Snapshot of counters and breakdowns with percentiles and histograms
    /// recomputed over the full log.
    #[must_use]
    pub fn summary(&self) -> Summary {
        let (aggregate, rtt_samples, jitter_samples) = {
            let state = self.state.read();
            let rtt_samples: Vec<f64> = state
                .metrics
                .iter()
                .filter(|metric| counts_toward_rtt(metric))
                .map(|metric| metric.rtt_ms)
                .collect();
            let jitter_samples: Vec<f64> = state
                .metrics
                .iter()
                .filter(|metric| counts_toward_jitter(metric))
                .map(|metric| metric.jitter_ms)
                .collect();
            (state.aggregate.clone(), rtt_samples, jitter_samples)
        };
        Summary::build(aggregate, rtt_samples, jitter_samples)
    }

    #[must_use]
    pub fn metrics(&self) -> Vec<Metric> {
        self.state.read().metrics.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().metrics.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rewrites the scenario label of every recorded metric and rebuilds the
    /// aggregate from scratch, all under the write lock.
    pub fn relabel_scenario(&self, label: &str) {
        let mut state = self.state.write();
        for metric in &mut state.metrics {
            if metric.scenario != label {
                label.clone_into(&mut metric.scenario);
            }
        }
        let rebuilt = Aggregate::rebuild(&state.metrics);
        state.aggregate = rebuilt;
    }
}

impl MetricsSink for StreamingSink {
    fn record(&self, metric: Metric) {
        StreamingSink::record(self, metric);
    }
}
