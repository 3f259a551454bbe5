use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::client::Client;
use crate::domain::{CipPath, IoConfig, IoConnectionConfig, IoTransport, TargetConfig};
use crate::error::ScenarioError;
use crate::metrics::{OperationKind, StreamingSink};
use crate::shutdown::ShutdownSignal;

use super::super::Scenario;
use super::super::io::IoScenario;
use super::super::test_support::{
    ScriptedClient, quiet_signal, read_targets, run_paused, test_params,
};
use super::super::tunnel::ConnectedTunnelScenario;

const RTT: Duration = Duration::from_millis(2);

fn cyclic(name: &str, instance: u16) -> IoConnectionConfig {
    IoConnectionConfig {
        name: name.to_owned(),
        rpi: Duration::from_millis(50),
        o_to_t_size: 32,
        t_to_o_size: 32,
        transport: IoTransport::Class1,
        connection_point: CipPath::object(0x04, instance),
    }
}

fn io_targets(count: u16) -> TargetConfig {
    TargetConfig {
        targets: Vec::new(),
        io: Some(IoConfig {
            connections: (1..=count)
                .map(|idx| cyclic(&format!("assembly_{}", idx), idx.saturating_add(100)))
                .collect(),
        }),
    }
}

#[test]
fn io_without_connections_is_rejected() -> Result<(), String> {
    run_paused(async {
        let sink = Arc::new(StreamingSink::new());
        let params = test_params(&sink, Duration::from_millis(100), Duration::from_secs(1));
        let (sender, _signal) = quiet_signal();
        let mut client = ScriptedClient::new(RTT);

        for targets in [read_targets(1), io_targets(0)] {
            let signal = ShutdownSignal::from_sender(&sender);
            let result = IoScenario.run(signal, &mut client, &targets, &params).await;
            if !matches!(result, Err(ScenarioError::MissingIoConfig { scenario: "io" })) {
                return Err(format!("Expected MissingIoConfig, got {:?}", result));
            }
        }
        if client.connects != 0 {
            return Err("Validation must happen before connecting".to_owned());
        }
        Ok(())
    })
}

#[test]
fn io_fails_when_no_connection_opens() -> Result<(), String> {
    run_paused(async {
        let sink = Arc::new(StreamingSink::new());
        let params = test_params(&sink, Duration::from_millis(100), Duration::from_secs(1));
        let (_sender, signal) = quiet_signal();
        let mut client = ScriptedClient::new(RTT)
            .open_script(vec![Err(ScriptedClient::refused()), Err(ScriptedClient::refused())]);

        let result = IoScenario.run(signal, &mut client, &io_targets(2), &params).await;
        if !matches!(result, Err(ScenarioError::AllConnectionsFailed { count: 2, .. })) {
            return Err(format!("Expected AllConnectionsFailed, got {:?}", result));
        }
        let failed_opens = sink
            .summary()
            .by_operation
            .get(&OperationKind::ConnectionOpen)
            .map_or(0, |breakdown| breakdown.failed);
        if failed_opens != 2 {
            return Err(format!("Both failed opens should be recorded, got {}", failed_opens));
        }
        Ok(())
    })
}

#[test]
fn io_continues_on_partial_open_and_closes_survivors() -> Result<(), String> {
    run_paused(async {
        let sink = Arc::new(StreamingSink::new());
        let params = test_params(&sink, Duration::from_millis(100), Duration::from_millis(500));
        let (_sender, signal) = quiet_signal();
        let mut client =
            ScriptedClient::new(RTT).open_script(vec![Err(ScriptedClient::refused()), Ok(())]);

        IoScenario
            .run(signal, &mut client, &io_targets(2), &params)
            .await
            .map_err(|err| err.to_string())?;

        let summary = sink.summary();
        let sends = summary
            .by_operation
            .get(&OperationKind::CyclicSend)
            .map_or(0, |breakdown| breakdown.success);
        let receives = summary
            .by_operation
            .get(&OperationKind::CyclicReceive)
            .map_or(0, |breakdown| breakdown.success);
        if sends < 5 || sends != receives {
            return Err(format!("Expected paired cyclic traffic, got {} sends / {} receives", sends, receives));
        }
        if let Some(metric) = sink
            .metrics()
            .iter()
            .find(|metric| metric.operation == OperationKind::CyclicSend && metric.target_name != "assembly_2")
        {
            return Err(format!("Traffic on a connection that never opened: {}", metric.target_name));
        }
        if client.opened != 1 || client.closed != 1 {
            return Err(format!("Expected 1 open / 1 close, got {} / {}", client.opened, client.closed));
        }
        Ok(())
    })
}

#[test]
fn connected_tunnel_holds_one_class3_connection() -> Result<(), String> {
    run_paused(async {
        let sink = Arc::new(StreamingSink::new());
        let params = test_params(&sink, Duration::from_millis(100), Duration::from_millis(500));
        let (_sender, signal) = quiet_signal();
        let mut client = ScriptedClient::new(RTT);

        ConnectedTunnelScenario
            .run(signal, &mut client, &read_targets(2), &params)
            .await
            .map_err(|err| err.to_string())?;

        let summary = sink.summary();
        let reads = summary
            .by_operation
            .get(&OperationKind::Read)
            .map_or(0, |breakdown| breakdown.success);
        if reads < 8 {
            return Err(format!("Expected tunneled reads, got {}", reads));
        }
        if client.opened != 1 || client.closed != 1 {
            return Err(format!("Expected 1 open / 1 close, got {} / {}", client.opened, client.closed));
        }
        if client.is_connected() {
            return Err("Client must be released".to_owned());
        }
        Ok(())
    })
}

#[test]
fn io_runs_for_the_full_duration() -> Result<(), String> {
    run_paused(async {
        let sink = Arc::new(StreamingSink::new());
        let interval = Duration::from_millis(100);
        let duration = Duration::from_millis(600);
        let params = test_params(&sink, interval, duration);
        let (_sender, signal) = quiet_signal();
        let mut client = ScriptedClient::new(RTT);

        let started = Instant::now();
        IoScenario
            .run(signal, &mut client, &io_targets(2), &params)
            .await
            .map_err(|err| err.to_string())?;
        let elapsed = started.elapsed();

        if elapsed < duration {
            return Err(format!("I/O run ended early: {:?}", elapsed));
        }
        if elapsed > duration.saturating_add(interval) {
            return Err(format!("I/O run overran its budget: {:?}", elapsed));
        }
        if client.opened != 2 || client.closed != 2 {
            return Err(format!("Expected 2 opens / 2 closes, got {} / {}", client.opened, client.closed));
        }
        Ok(())
    })
}
