use std::sync::Arc;
use std::thread;

use super::*;
use crate::domain::TargetType;

const TOLERANCE: f64 = 1e-9;

fn close(left: f64, right: f64) -> bool {
    (left - right).abs() < TOLERANCE
}

fn read_metric(scenario: &str, rtt_ms: f64) -> Metric {
    Metric::new(
        scenario,
        TargetType::EmulatedAdapter,
        OperationKind::Read,
        "identity",
        "0x0E",
    )
    .with_rtt_ms(rtt_ms)
}

#[test]
fn nearest_rank_matches_reference_values() -> Result<(), String> {
    let sink = StreamingSink::new();
    for rtt in 1..=10_u32 {
        sink.record(read_metric("baseline", f64::from(rtt)));
    }
    let summary = sink.summary();
    let expected = [
        ("p50", summary.rtt.p50_ms, 5.0),
        ("p90", summary.rtt.p90_ms, 9.0),
        ("p95", summary.rtt.p95_ms, 10.0),
        ("p99", summary.rtt.p99_ms, 10.0),
        ("min", summary.rtt.min_ms, 1.0),
        ("max", summary.rtt.max_ms, 10.0),
        ("avg", summary.rtt.avg_ms, 5.5),
    ];
    for (label, actual, wanted) in expected {
        if !close(actual, wanted) {
            return Err(format!("{} expected {}, got {}", label, wanted, actual));
        }
    }
    Ok(())
}

#[test]
fn nearest_rank_handles_tiny_inputs() -> Result<(), String> {
    if !close(nearest_rank(&[], P50), 0.0) {
        return Err("Empty input should yield 0".to_owned());
    }
    if !close(nearest_rank(&[7.0], P99), 7.0) {
        return Err("Single sample should be every percentile".to_owned());
    }
    if !close(nearest_rank(&[1.0, 2.0], 0), 1.0) {
        return Err("Rank must clamp to the first sample".to_owned());
    }
    Ok(())
}

#[test]
fn histogram_buckets_are_exhaustive() -> Result<(), String> {
    let sink = StreamingSink::new();
    let samples = [0.5, 1.0, 4.99, 5.0, 9.0, 10.0, 49.0, 50.0, 99.9, 100.0, 499.0, 500.0, 2_000.0];
    for rtt in samples {
        sink.record(read_metric("baseline", rtt));
    }
    sink.record(read_metric("baseline", 0.0));
    sink.record(read_metric("baseline", 3.0).failed(0x05, ""));

    let summary = sink.summary();
    let histogram = summary.rtt.histogram;
    if histogram.total() != summary.rtt.samples {
        return Err(format!(
            "Bucket total {} != qualifying samples {}",
            histogram.total(),
            summary.rtt.samples
        ));
    }
    if histogram.counts() != &[1, 2, 2, 2, 2, 2, 2] {
        return Err(format!("Unexpected buckets {:?}", histogram.counts()));
    }
    Ok(())
}

#[test]
fn classifier_uses_error_text_then_status() -> Result<(), String> {
    let cases = [
        ("", 0, Outcome::Success),
        ("", 0x05, Outcome::Error),
        ("i/o timeout after 1000ms", 0, Outcome::Timeout),
        ("connection reset by peer", 0, Outcome::Error),
        ("Timeout", 0, Outcome::Error),
    ];
    for (error, status, expected) in cases {
        let actual = classify_outcome(error, status);
        if actual != expected {
            return Err(format!(
                "({:?}, {}) expected {}, got {}",
                error, status, expected, actual
            ));
        }
    }
    Ok(())
}

#[test]
fn failure_counters_follow_error_text() -> Result<(), String> {
    let sink = StreamingSink::new();
    sink.record(read_metric("churn", 0.0).failed(0, "i/o timeout after 500ms"));
    sink.record(read_metric("churn", 0.0).failed(0, "connection failed: refused"));
    sink.record(read_metric("churn", 0.0).failed(0x08, ""));
    sink.record(read_metric("churn", 2.0));

    let summary = sink.summary();
    if summary.total_operations != 4
        || summary.successful_operations != 1
        || summary.failed_operations != 3
    {
        return Err(format!("Unexpected totals {:?}", summary));
    }
    if summary.timeouts != 1 || summary.connection_failures != 1 {
        return Err(format!(
            "timeouts={} connection_failures={}",
            summary.timeouts, summary.connection_failures
        ));
    }
    Ok(())
}

#[test]
fn misclassification_counts_only_concrete_expectations() -> Result<(), String> {
    let sink = StreamingSink::new();
    sink.record(
        read_metric("dpi", 0.0)
            .failed(0, "i/o timeout after 1000ms")
            .with_expected(ExpectedOutcome::Success),
    );
    if sink.summary().misclassifications != 1 {
        return Err("success vs timeout must count once".to_owned());
    }

    for metric in [
        read_metric("dpi", 1.0).with_expected(ExpectedOutcome::Any),
        read_metric("dpi", 0.0)
            .failed(0x05, "")
            .with_expected(ExpectedOutcome::Any),
        read_metric("dpi", 0.0).failed(0, "i/o timeout after 1000ms"),
        read_metric("dpi", 0.0)
            .failed(0x05, "")
            .with_expected(ExpectedOutcome::Error),
    ] {
        sink.record(metric);
    }
    let summary = sink.summary();
    if summary.misclassifications != 1 {
        return Err(format!(
            "Expected misclassifications to stay at 1, got {}",
            summary.misclassifications
        ));
    }
    Ok(())
}

#[test]
fn breakdowns_are_created_per_key() -> Result<(), String> {
    let sink = StreamingSink::new();
    sink.record(read_metric("a", 2.0));
    sink.record(read_metric("a", 4.0));
    sink.record(
        Metric::new(
            "b",
            TargetType::EmulatedPlc,
            OperationKind::Write,
            "setpoint",
            "0x10",
        )
        .with_rtt_ms(3.0)
        .failed(0x0E, ""),
    );

    let summary = sink.summary();
    let reads = summary
        .by_operation
        .get(&OperationKind::Read)
        .ok_or("Missing read breakdown")?;
    if reads.count != 2 || reads.success != 2 || !close(reads.avg_rtt_ms(), 3.0) {
        return Err(format!("Unexpected read breakdown {:?}", reads));
    }
    let writes = summary
        .by_scenario
        .get("b")
        .ok_or("Missing scenario b breakdown")?;
    if writes.count != 1 || writes.failed != 1 || writes.rtt.samples() != 0 {
        return Err(format!("Unexpected scenario b breakdown {:?}", writes));
    }
    Ok(())
}

#[test]
fn jitter_statistics_ignore_zero_samples() -> Result<(), String> {
    let sink = StreamingSink::new();
    sink.record(read_metric("a", 1.0));
    sink.record(read_metric("a", 1.0).with_jitter_ms(4.0));
    sink.record(read_metric("a", 1.0).with_jitter_ms(2.0));
    let jitter = sink.summary().jitter;
    if jitter.samples != 2 || !close(jitter.min_ms, 2.0) || !close(jitter.avg_ms, 3.0) {
        return Err(format!("Unexpected jitter stats {:?}", jitter));
    }
    Ok(())
}

#[test]
fn relabel_is_idempotent_and_matches_fresh_aggregation() -> Result<(), String> {
    let sink = StreamingSink::new();
    sink.record(read_metric("pending", 1.0));
    sink.record(read_metric("other", 2.0).failed(0, "i/o timeout after 5ms"));
    sink.record(read_metric("pending", 3.0));

    sink.relabel_scenario("x");
    let once = sink.summary();
    sink.relabel_scenario("x");
    let twice = sink.summary();

    if sink.metrics().iter().any(|metric| metric.scenario != "x") {
        return Err("Every metric must carry the new label".to_owned());
    }
    if once.by_scenario != twice.by_scenario || once.rtt != twice.rtt {
        return Err("Second relabel changed the summary".to_owned());
    }

    let fresh = StreamingSink::new();
    for metric in sink.metrics() {
        fresh.record(metric);
    }
    let expected = fresh.summary();
    if twice.by_scenario != expected.by_scenario
        || twice.total_operations != expected.total_operations
        || twice.timeouts != expected.timeouts
        || twice.rtt != expected.rtt
    {
        return Err("Relabeled summary differs from fresh aggregation".to_owned());
    }
    if twice.by_scenario.len() != 1 {
        return Err(format!("Expected a single scenario, got {:?}", twice.by_scenario));
    }
    Ok(())
}

#[test]
fn concurrent_recording_keeps_exact_counts() -> Result<(), String> {
    let sink = Arc::new(StreamingSink::new());
    let mut handles = Vec::new();
    for worker in 0..4_u32 {
        let sink = Arc::clone(&sink);
        handles.push(thread::spawn(move || {
            for idx in 0..250_u32 {
                let rtt = f64::from(idx % 10) + 1.0;
                sink.record(read_metric(&format!("worker_{}", worker), rtt));
            }
        }));
    }
    let reader = {
        let sink = Arc::clone(&sink);
        thread::spawn(move || {
            let mut last = 0;
            for _ in 0..50 {
                let summary = sink.summary();
                if summary.total_operations < last {
                    return false;
                }
                if summary.rtt.histogram.total() != summary.rtt.samples {
                    return false;
                }
                last = summary.total_operations;
            }
            true
        })
    };
    for handle in handles {
        handle
            .join()
            .map_err(|_| "Writer thread panicked".to_owned())?;
    }
    let consistent = reader
        .join()
        .map_err(|_| "Reader thread panicked".to_owned())?;
    if !consistent {
        return Err("Reader observed an inconsistent snapshot".to_owned());
    }
    let summary = sink.summary();
    if summary.total_operations != 1_000 || summary.by_scenario.len() != 4 {
        return Err(format!(
            "total={} scenarios={}",
            summary.total_operations,
            summary.by_scenario.len()
        ));
    }
    Ok(())
}

#[test]
fn distribution_table_covers_every_scope() -> Result<(), String> {
    let sink = StreamingSink::new();
    sink.record(read_metric("a", 1.0));
    sink.record(read_metric("b", 2.0));
    sink.record(
        Metric::new(
            "b",
            TargetType::EmulatedAdapter,
            OperationKind::Write,
            "setpoint",
            "0x10",
        )
        .with_rtt_ms(3.0),
    );
    let rows = distribution_table(&sink.metrics(), &sink.summary());

    let count_of = |scope: DistributionScope| rows.iter().filter(|row| row.scope == scope).count();
    let expected = [
        (DistributionScope::Counts, 6),
        (DistributionScope::All, 2),
        (DistributionScope::Operation, 4),
        (DistributionScope::Scenario, 4),
        (DistributionScope::ScenarioOperation, 6),
    ];
    for (scope, wanted) in expected {
        if count_of(scope) != wanted {
            return Err(format!(
                "{} rows: expected {}, got {}",
                scope.as_str(),
                wanted,
                count_of(scope)
            ));
        }
    }
    let all_rtt = rows
        .iter()
        .find(|row| row.scope == DistributionScope::All && row.series == "rtt")
        .ok_or("Missing all/rtt row")?;
    if all_rtt.count != 3 || !close(all_rtt.stats.p50_ms, 2.0) {
        return Err(format!("Unexpected all/rtt row {:?}", all_rtt));
    }
    Ok(())
}

#[test]
fn report_mentions_counts_and_breakdowns() -> Result<(), String> {
    let sink = StreamingSink::new();
    sink.record(read_metric("dpi_explicit:phase_1_baseline", 5.0));
    let text = render_summary(&sink.summary());
    for needle in [
        "Total Operations: 1",
        "P50/P90/P95/P99: 5.00",
        "dpi_explicit:phase_1_baseline",
        "5-10ms=1",
    ] {
        if !text.contains(needle) {
            return Err(format!("Report is missing '{}':\n{}", needle, text));
        }
    }
    Ok(())
}
