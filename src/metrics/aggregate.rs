use std::collections::BTreeMap;

use super::outcome::{is_connection_failure, is_timeout};
use super::types::{Metric, OperationKind};

/// Incrementally maintained min / max / mean.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningStats {
    samples: u64,
    min: f64,
    max: f64,
    mean: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.samples = self.samples.saturating_add(1);
        if self.samples == 1 {
            // Min starts at zero; the first sample must replace it.
            self.min = value;
            self.max = value;
            self.mean = value;
            return;
        }
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.mean += (value - self.mean) / self.samples as f64;
    }

    #[must_use]
    pub const fn samples(&self) -> u64 {
        self.samples
    }

    #[must_use]
    pub const fn min(&self) -> f64 {
        self.min
    }

    #[must_use]
    pub const fn max(&self) -> f64 {
        self.max
    }

    #[must_use]
    pub const fn mean(&self) -> f64 {
        self.mean
    }
}

/// Counts and RTT range for one slice (an operation kind or a scenario).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Breakdown {
    pub count: u64,
    pub success: u64,
    pub failed: u64,
    pub rtt: RunningStats,
}

impl Breakdown {
    fn absorb(&mut self, metric: &Metric) {
        self.count = self.count.saturating_add(1);
        if metric.success {
            self.success = self.success.saturating_add(1);
        } else {
            self.failed = self.failed.saturating_add(1);
        }
        if counts_toward_rtt(metric) {
            self.rtt.push(metric.rtt_ms);
        }
    }

    #[must_use]
    pub const fn min_rtt_ms(&self) -> f64 {
        self.rtt.min()
    }

    #[must_use]
    pub const fn max_rtt_ms(&self) -> f64 {
        self.rtt.max()
    }

    #[must_use]
    pub const fn avg_rtt_ms(&self) -> f64 {
        self.rtt.mean()
    }
}

pub(crate) fn counts_toward_rtt(metric: &Metric) -> bool {
    metric.success && metric.rtt_ms > 0.0
}

pub(crate) fn counts_toward_jitter(metric: &Metric) -> bool {
    metric.jitter_ms > 0.0
}

/// Exact counters over every metric absorbed so far.
#[derive(Debug, Clone, Default)]
pub(crate) struct Aggregate {
    pub(crate) total: u64,
    pub(crate) successful: u64,
    pub(crate) failed: u64,
    pub(crate) timeouts: u64,
    pub(crate) connection_failures: u64,
    pub(crate) misclassified: u64,
    pub(crate) rtt: RunningStats,
    pub(crate) jitter: RunningStats,
    pub(crate) by_operation: BTreeMap<OperationKind, Breakdown>,
    pub(crate) by_scenario: BTreeMap<String, Breakdown>,
}

impl Aggregate {
    pub(crate) fn rebuild<'metric>(metrics: impl IntoIterator<Item = &'metric Metric>) -> Self {
        let mut aggregate = Self::default();
        for metric in metrics {
            aggregate.absorb(metric);
        }
        aggregate
    }

    pub(crate) fn absorb(&mut self, metric: &Metric) {
        self.total = self.total.saturating_add(1);
        if metric.success {
            self.successful = self.successful.saturating_add(1);
        } else {
            self.failed = self.failed.saturating_add(1);
        }
        if !metric.error.is_empty() {
            if is_timeout(&metric.error) {
                self.timeouts = self.timeouts.saturating_add(1);
            }
            if is_connection_failure(&metric.error) {
                self.connection_failures = self.connection_failures.saturating_add(1);
            }
        }
        if metric.is_misclassified() {
            self.misclassified = self.misclassified.saturating_add(1);
        }
        if counts_toward_rtt(metric) {
            self.rtt.push(metric.rtt_ms);
        }
        if counts_toward_jitter(metric) {
            self.jitter.push(metric.jitter_ms);
        }

        self.by_operation
            .entry(metric.operation)
            .or_default()
            .absorb(metric);
        match self.by_scenario.get_mut(metric.scenario.as_str()) {
            Some(breakdown) => breakdown.absorb(metric),
            None => {
                let mut breakdown = Breakdown::default();
                breakdown.absorb(metric);
                self.by_scenario.insert(metric.scenario.clone(), breakdown);
            }
        }
    }
}
