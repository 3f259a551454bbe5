use std::time::Duration;

use tracing::info;

use crate::metrics::{LatencyStats, Outcome};

/// The six DPI traffic patterns, run strictly in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PhaseKind {
    Baseline,
    EncodingAmbiguity,
    ConnectionLifecycle,
    LargePayloads,
    ProtocolViolations,
    AllowlistPrecision,
}

pub(crate) const PHASES: [PhaseKind; 6] = [
    PhaseKind::Baseline,
    PhaseKind::EncodingAmbiguity,
    PhaseKind::ConnectionLifecycle,
    PhaseKind::LargePayloads,
    PhaseKind::ProtocolViolations,
    PhaseKind::AllowlistPrecision,
];

impl PhaseKind {
    pub(crate) const fn slug(self) -> &'static str {
        match self {
            PhaseKind::Baseline => "baseline",
            PhaseKind::EncodingAmbiguity => "encoding_ambiguity",
            PhaseKind::ConnectionLifecycle => "connection_lifecycle",
            PhaseKind::LargePayloads => "large_payloads",
            PhaseKind::ProtocolViolations => "protocol_violations",
            PhaseKind::AllowlistPrecision => "allowlist_precision",
        }
    }

    /// Share of the run budget; the six weights sum to 1.0.
    pub(crate) const fn weight(self) -> f64 {
        match self {
            PhaseKind::Baseline
            | PhaseKind::EncodingAmbiguity
            | PhaseKind::LargePayloads
            | PhaseKind::AllowlistPrecision => 0.15,
            PhaseKind::ConnectionLifecycle | PhaseKind::ProtocolViolations => 0.20,
        }
    }
}

/// Composite metric label, e.g. `dpi_explicit:phase_2_connection_lifecycle`.
pub(crate) fn phase_label(scenario: &str, index: usize, kind: PhaseKind) -> String {
    format!("{}:phase_{}_{}", scenario, index, kind.slug())
}

/// Per-phase tallies, finalized once the phase's sub-deadline passes.
#[derive(Debug, Clone, Default)]
pub(crate) struct PhaseResult {
    pub(crate) label: String,
    pub(crate) total: u64,
    pub(crate) success: u64,
    pub(crate) failed: u64,
    pub(crate) timeouts: u64,
    pub(crate) resets: u64,
    pub(crate) elapsed: Duration,
    pub(crate) rtt: LatencyStats,
    rtt_samples: Vec<f64>,
}

impl PhaseResult {
    pub(crate) fn new(label: String) -> Self {
        Self {
            label,
            ..Self::default()
        }
    }

    pub(crate) fn absorb(&mut self, success: bool, outcome: Outcome, reset: bool, rtt_ms: f64) {
        self.total = self.total.saturating_add(1);
        if success {
            self.success = self.success.saturating_add(1);
            if rtt_ms > 0.0 {
                self.rtt_samples.push(rtt_ms);
            }
        } else {
            self.failed = self.failed.saturating_add(1);
        }
        if outcome == Outcome::Timeout {
            self.timeouts = self.timeouts.saturating_add(1);
        }
        if reset {
            self.resets = self.resets.saturating_add(1);
        }
    }

    pub(crate) fn finalize(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
        self.rtt = LatencyStats::from_samples(std::mem::take(&mut self.rtt_samples));
        info!(
            "{} done in {:?}: {} ops, {} ok, {} failed, {} timeouts, {} resets, p50 {:.2}ms",
            self.label,
            self.elapsed,
            self.total,
            self.success,
            self.failed,
            self.timeouts,
            self.resets,
            self.rtt.p50_ms
        );
    }
}

/// Logs the per-phase table after the last phase.
pub(crate) fn log_phase_table(scenario: &str, results: &[PhaseResult]) {
    info!("{} phase summary:", scenario);
    info!(
        "{:<48} {:>8} {:>8} {:>8} {:>8} {:>8} {:>10} {:>10}",
        "phase", "total", "ok", "fail", "timeout", "reset", "p50 ms", "p95 ms"
    );
    for result in results {
        info!(
            "{:<48} {:>8} {:>8} {:>8} {:>8} {:>8} {:>10.2} {:>10.2}",
            result.label,
            result.total,
            result.success,
            result.failed,
            result.timeouts,
            result.resets,
            result.rtt.p50_ms,
            result.rtt.p95_ms
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_sum_to_one() -> Result<(), String> {
        let sum: f64 = PHASES.iter().map(|phase| phase.weight()).sum();
        if (sum - 1.0).abs() > 1e-9 {
            return Err(format!("weights sum to {}", sum));
        }
        Ok(())
    }

    #[test]
    fn labels_are_zero_indexed_and_composite() -> Result<(), String> {
        let label = phase_label("dpi_explicit", 2, PhaseKind::ConnectionLifecycle);
        if label != "dpi_explicit:phase_2_connection_lifecycle" {
            return Err(format!("label: {}", label));
        }
        Ok(())
    }

    #[test]
    fn result_only_samples_successful_rtts() -> Result<(), String> {
        let mut result = PhaseResult::new("p".to_owned());
        result.absorb(true, Outcome::Success, false, 4.0);
        result.absorb(true, Outcome::Success, false, 0.0);
        result.absorb(false, Outcome::Timeout, false, 900.0);
        result.absorb(false, Outcome::Error, true, 1.0);
        result.finalize(Duration::from_secs(1));
        if result.total != 4 || result.success != 2 || result.failed != 2 {
            return Err(format!("counts: {:?}", result));
        }
        if result.timeouts != 1 || result.resets != 1 || result.rtt.samples != 1 {
            return Err(format!("tallies: {:?}", result));
        }
        Ok(())
    }
}
