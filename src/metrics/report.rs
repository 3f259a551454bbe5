use super::aggregate::Breakdown;
use super::summary::{LatencyStats, Summary};

/// Basis points per percent, for the x100 success rate.
const PERCENT_DIVISOR: u64 = 100;

/// Renders the human-readable summary block printed at the end of a run.
#[must_use]
pub fn render_summary(summary: &Summary) -> String {
    summary_lines(summary).join("\n")
}

pub(crate) fn summary_lines(summary: &Summary) -> Vec<String> {
    let mut lines = Vec::new();
    let rate = summary.success_rate_x100();
    lines.push("=== Run Summary ===".to_owned());
    lines.push(format!("Total Operations: {}", summary.total_operations));
    lines.push(format!(
        "Successful: {} ({}.{:02}%)",
        summary.successful_operations,
        rate / PERCENT_DIVISOR,
        rate % PERCENT_DIVISOR
    ));
    lines.push(format!("Failed: {}", summary.failed_operations));
    lines.push(format!("Timeouts: {}", summary.timeouts));
    lines.push(format!("Connection Failures: {}", summary.connection_failures));
    lines.push(format!("Misclassifications: {}", summary.misclassifications));

    lines.push(String::new());
    push_latency(&mut lines, "RTT", &summary.rtt);
    lines.push(String::new());
    push_latency(&mut lines, "Jitter", &summary.jitter);

    if !summary.by_operation.is_empty() {
        lines.push(String::new());
        lines.push("By Operation:".to_owned());
        for (operation, breakdown) in &summary.by_operation {
            lines.push(breakdown_line(operation.as_str(), breakdown));
        }
    }
    if !summary.by_scenario.is_empty() {
        lines.push(String::new());
        lines.push("By Scenario:".to_owned());
        for (scenario, breakdown) in &summary.by_scenario {
            lines.push(breakdown_line(scenario, breakdown));
        }
    }
    lines
}

fn push_latency(lines: &mut Vec<String>, label: &str, stats: &LatencyStats) {
    if stats.samples == 0 {
        lines.push(format!("{} (ms): no samples", label));
        return;
    }
    lines.push(format!("{} (ms) over {} samples:", label, stats.samples));
    lines.push(format!(
        "  Min/Avg/Max: {:.2} / {:.2} / {:.2}",
        stats.min_ms, stats.avg_ms, stats.max_ms
    ));
    lines.push(format!(
        "  P50/P90/P95/P99: {:.2} / {:.2} / {:.2} / {:.2}",
        stats.p50_ms, stats.p90_ms, stats.p95_ms, stats.p99_ms
    ));
    let buckets: Vec<String> = stats
        .histogram
        .buckets()
        .map(|(bucket, count)| format!("{}={}", bucket, count))
        .collect();
    lines.push(format!("  Buckets: {}", buckets.join(" ")));
}

fn breakdown_line(key: &str, breakdown: &Breakdown) -> String {
    format!(
        "  {:<48} count={} ok={} fail={} rtt min/avg/max={:.2}/{:.2}/{:.2}",
        key,
        breakdown.count,
        breakdown.success,
        breakdown.failed,
        breakdown.min_rtt_ms(),
        breakdown.avg_rtt_ms(),
        breakdown.max_rtt_ms()
    )
}
