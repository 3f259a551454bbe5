use std::collections::BTreeMap;

use super::aggregate::{counts_toward_jitter, counts_toward_rtt};
use super::histogram::BUCKET_COUNT;
use super::summary::{LatencyStats, Summary};
use super::types::{Metric, OperationKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionScope {
    Counts,
    All,
    Operation,
    Scenario,
    ScenarioOperation,
}

impl DistributionScope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DistributionScope::Counts => "counts",
            DistributionScope::All => "all",
            DistributionScope::Operation => "operation",
            DistributionScope::Scenario => "scenario",
            DistributionScope::ScenarioOperation => "scenario_operation",
        }
    }
}

/// One row of the finalized distribution table.
///
/// `counts` rows carry a counter name in `series` and its value in `count`;
/// every other scope carries `rtt` or `jitter` statistics for its slice.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionRow {
    pub scope: DistributionScope,
    pub scenario: String,
    pub operation: String,
    pub series: &'static str,
    pub count: u64,
    pub stats: LatencyStats,
}

impl DistributionRow {
    fn counter(series: &'static str, count: u64) -> Self {
        Self {
            scope: DistributionScope::Counts,
            scenario: String::new(),
            operation: String::new(),
            series,
            count,
            stats: LatencyStats::default(),
        }
    }

    #[must_use]
    pub const fn buckets(&self) -> &[u64; BUCKET_COUNT] {
        self.stats.histogram.counts()
    }
}

/// Builds the distribution table sliced by all, operation, scenario and
/// scenario × operation, preceded by the run counters.
#[must_use]
pub fn distribution_table(metrics: &[Metric], summary: &Summary) -> Vec<DistributionRow> {
    let mut rows = vec![
        DistributionRow::counter("total_operations", summary.total_operations),
        DistributionRow::counter("successful_operations", summary.successful_operations),
        DistributionRow::counter("failed_operations", summary.failed_operations),
        DistributionRow::counter("timeouts", summary.timeouts),
        DistributionRow::counter("connection_failures", summary.connection_failures),
        DistributionRow::counter("misclassifications", summary.misclassifications),
    ];

    let all: Vec<&Metric> = metrics.iter().collect();
    push_slice(&mut rows, DistributionScope::All, "", "", &all);

    let mut by_operation: BTreeMap<OperationKind, Vec<&Metric>> = BTreeMap::new();
    let mut by_scenario: BTreeMap<&str, Vec<&Metric>> = BTreeMap::new();
    let mut by_pair: BTreeMap<(&str, OperationKind), Vec<&Metric>> = BTreeMap::new();
    for metric in metrics {
        by_operation.entry(metric.operation).or_default().push(metric);
        by_scenario
            .entry(metric.scenario.as_str())
            .or_default()
            .push(metric);
        by_pair
            .entry((metric.scenario.as_str(), metric.operation))
            .or_default()
            .push(metric);
    }

    for (operation, slice) in &by_operation {
        push_slice(
            &mut rows,
            DistributionScope::Operation,
            "",
            operation.as_str(),
            slice,
        );
    }
    for (scenario, slice) in &by_scenario {
        push_slice(&mut rows, DistributionScope::Scenario, scenario, "", slice);
    }
    for ((scenario, operation), slice) in &by_pair {
        push_slice(
            &mut rows,
            DistributionScope::ScenarioOperation,
            scenario,
            operation.as_str(),
            slice,
        );
    }
    rows
}

fn push_slice(
    rows: &mut Vec<DistributionRow>,
    scope: DistributionScope,
    scenario: &str,
    operation: &str,
    slice: &[&Metric],
) {
    let count = u64::try_from(slice.len()).unwrap_or(u64::MAX);
    let rtt: Vec<f64> = slice
        .iter()
        .filter(|metric| counts_toward_rtt(metric))
        .map(|metric| metric.rtt_ms)
        .collect();
    let jitter: Vec<f64> = slice
        .iter()
        .filter(|metric| counts_toward_jitter(metric))
        .map(|metric| metric.jitter_ms)
        .collect();
    for (series, samples) in [("rtt", rtt), ("jitter", jitter)] {
        rows.push(DistributionRow {
            scope,
            scenario: scenario.to_owned(),
            operation: operation.to_owned(),
            series,
            count,
            stats: LatencyStats::from_samples(samples),
        });
    }
}
