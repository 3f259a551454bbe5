use std::sync::Arc;
use std::time::Duration;

use crate::domain::{CipPath, ServiceCode, TargetDescriptor, WritePattern, WriteTarget};
use crate::metrics::{OperationKind, StreamingSink};

use super::super::Scenario;
use super::super::baseline::BaselineScenario;
use super::super::mixed::MixedScenario;
use super::super::test_support::{
    ScriptedClient, quiet_signal, read_targets, run_paused, test_params,
};

const RTT: Duration = Duration::from_millis(5);

#[test]
fn steady_polling_reads_every_target_each_interval() -> Result<(), String> {
    run_paused(async {
        let sink = Arc::new(StreamingSink::new());
        let params = test_params(&sink, Duration::from_millis(100), Duration::from_millis(500));
        let (_sender, signal) = quiet_signal();
        let mut client = ScriptedClient::new(RTT);

        BaselineScenario
            .run(signal, &mut client, &read_targets(2), &params)
            .await
            .map_err(|err| err.to_string())?;

        let summary = sink.summary();
        if !(8..=12).contains(&summary.total_operations) {
            return Err(format!("Expected ~10 reads, got {}", summary.total_operations));
        }
        if summary.failed_operations != 0 {
            return Err(format!("Unexpected failures: {}", summary.failed_operations));
        }
        if (summary.rtt.p50_ms - 5.0).abs() > 0.5 {
            return Err(format!("P50 should sit at the client RTT, got {}", summary.rtt.p50_ms));
        }
        let reads = summary
            .by_operation
            .get(&OperationKind::Read)
            .map_or(0, |breakdown| breakdown.count);
        if reads != summary.total_operations {
            return Err(format!("Only reads expected, got {} of {}", reads, summary.total_operations));
        }
        Ok(())
    })
}

#[test]
fn polling_without_read_targets_falls_back_to_identity() -> Result<(), String> {
    run_paused(async {
        let sink = Arc::new(StreamingSink::new());
        let params = test_params(&sink, Duration::from_millis(100), Duration::from_millis(300));
        let (_sender, signal) = quiet_signal();
        let mut client = ScriptedClient::new(RTT);

        BaselineScenario
            .run(signal, &mut client, &read_targets(0), &params)
            .await
            .map_err(|err| err.to_string())?;

        let metrics = sink.metrics();
        if metrics.is_empty() {
            return Err("No reads recorded".to_owned());
        }
        if let Some(metric) = metrics
            .iter()
            .find(|metric| metric.target_name != "identity_vendor_id")
        {
            return Err(format!("Unexpected target {}", metric.target_name));
        }
        Ok(())
    })
}

#[test]
fn mixed_traffic_interleaves_reads_and_writes() -> Result<(), String> {
    run_paused(async {
        let mut targets = read_targets(2);
        targets.targets.push(TargetDescriptor::Write(WriteTarget {
            name: "setpoint".to_owned(),
            service: ServiceCode::SET_ATTRIBUTE_SINGLE,
            path: CipPath::attribute(0x04, 0x64, 3),
            pattern: WritePattern::Increment,
            width: 2,
            initial: 0,
        }));
        let sink = Arc::new(StreamingSink::new());
        let params = test_params(&sink, Duration::from_millis(50), Duration::from_millis(500));
        let (_sender, signal) = quiet_signal();
        let mut client = ScriptedClient::new(RTT);

        MixedScenario
            .run(signal, &mut client, &targets, &params)
            .await
            .map_err(|err| err.to_string())?;

        let summary = sink.summary();
        if summary.total_operations == 0 {
            return Err("Mixed scenario recorded nothing".to_owned());
        }
        for kind in [OperationKind::Read, OperationKind::Write] {
            if !summary.by_operation.contains_key(&kind) {
                return Err(format!("Mixed scenario issued no {} operations", kind));
            }
        }
        Ok(())
    })
}
