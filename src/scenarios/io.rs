use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{Instrument, info, warn};

use crate::client::{Client, IoConnection, IoConnectionParams};
use crate::domain::{IoConfig, ProtocolProfile, ServiceCode, TargetConfig};
use crate::error::{ClientError, ScenarioError};
use crate::metrics::OperationKind;
use crate::shutdown::ShutdownSignal;

use super::context::{OpSpec, RunContext, release};
use super::reconnect::{Link, connect_initial, ensure_connected};
use super::timing::{instant_after, observed_jitter};
use super::{Scenario, ScenarioParams};

/// Largest payload a standard Forward_Open can negotiate.
const MAX_STANDARD_OPEN_SIZE: usize = 511;
/// Bytes of the running sequence number at the start of every payload.
const SEQUENCE_WIDTH: usize = 4;

#[derive(Debug)]
struct CyclicSlot {
    params: IoConnectionParams,
    handle: Option<IoConnection>,
    next_due: Instant,
    sequence: u64,
}

impl CyclicSlot {
    fn open_service(&self) -> ServiceCode {
        if self.params.o_to_t_size > MAX_STANDARD_OPEN_SIZE
            || self.params.t_to_o_size > MAX_STANDARD_OPEN_SIZE
        {
            ServiceCode::LARGE_FORWARD_OPEN
        } else {
            ServiceCode::FORWARD_OPEN
        }
    }

    fn next_payload(&mut self, profile: ProtocolProfile) -> Vec<u8> {
        let size = self.params.o_to_t_size;
        let mut payload = profile.encode_value(self.sequence, SEQUENCE_WIDTH.min(size));
        payload.resize(size, 0);
        self.sequence = self.sequence.wrapping_add(1);
        payload
    }
}

/// Opens every configured cyclic connection and exchanges data at each
/// connection's RPI. Fatal only when no connection opens at all.
#[derive(Debug, Default)]
pub(crate) struct IoScenario;

#[async_trait]
impl Scenario for IoScenario {
    fn name(&self) -> &'static str {
        "io"
    }

    fn description(&self) -> &'static str {
        "Cyclic I/O: forward-open every configured connection, produce and consume at the RPI"
    }

    async fn run(
        &self,
        shutdown: ShutdownSignal,
        client: &mut dyn Client,
        targets: &TargetConfig,
        params: &ScenarioParams,
    ) -> Result<(), ScenarioError> {
        let io = match &targets.io {
            Some(io) if !io.connections.is_empty() => io,
            Some(_) | None => {
                return Err(ScenarioError::MissingIoConfig {
                    scenario: self.name(),
                });
            }
        };
        let mut slots = build_slots(io);
        let mut ctx = RunContext::new(params, shutdown);
        let result = io_loop(&mut ctx, client, &mut slots, self.name())
            .instrument(params.span.clone())
            .await;
        close_all(&ctx, client, &mut slots, self.name()).await;
        release(client).await;
        result
    }
}

fn build_slots(io: &IoConfig) -> Vec<CyclicSlot> {
    let now = Instant::now();
    io.connections
        .iter()
        .map(|config| CyclicSlot {
            params: IoConnectionParams::from(config),
            handle: None,
            next_due: now,
            sequence: 0,
        })
        .collect()
}

/// Forward-opens every slot without a handle. Returns the last open error,
/// or `None` when cancelled.
async fn open_all(
    ctx: &mut RunContext<'_>,
    client: &mut dyn Client,
    slots: &mut [CyclicSlot],
    label: &str,
) -> Option<Option<ClientError>> {
    let mut last_error = None;
    for slot in slots.iter_mut().filter(|slot| slot.handle.is_none()) {
        let spec = OpSpec::new(label, OperationKind::ConnectionOpen, &slot.params.name)
            .service(slot.open_service());
        let (opened, rtt) = ctx.timed(client.forward_open(&slot.params)).await?;
        match opened {
            Ok(connection) => {
                ctx.record_status(&spec, Ok(0), rtt);
                info!(
                    "{}: opened {} ({} O->T 0x{:08X}, RPI {:?})",
                    label,
                    slot.params.name,
                    slot.params.transport.as_str(),
                    connection.o_to_t_id,
                    slot.params.rpi
                );
                slot.handle = Some(connection);
                slot.next_due = Instant::now();
            }
            Err(err) => {
                ctx.record_status(&spec, Err(&err), rtt);
                last_error = Some(err);
            }
        }
    }
    Some(last_error)
}

async fn io_loop(
    ctx: &mut RunContext<'_>,
    client: &mut dyn Client,
    slots: &mut [CyclicSlot],
    label: &str,
) -> Result<(), ScenarioError> {
    if connect_initial(ctx, client).await? == Link::Cancelled {
        return Ok(());
    }
    let Some(last_error) = open_all(ctx, client, slots, label).await else {
        return Ok(());
    };
    let open = slots.iter().filter(|slot| slot.handle.is_some()).count();
    if open == 0 {
        return Err(ScenarioError::AllConnectionsFailed {
            count: slots.len(),
            source: last_error.unwrap_or(ClientError::NotConnected),
        });
    }
    if open < slots.len() {
        warn!(
            "{}: only {}/{} cyclic connections opened, continuing",
            label,
            open,
            slots.len()
        );
    }

    let profile = ctx.params().profile;
    while !ctx.should_stop() {
        if !client.is_connected() {
            for slot in slots.iter_mut() {
                slot.handle = None;
            }
            if !ensure_connected(ctx, client).await?.is_up() {
                break;
            }
            if open_all(ctx, client, slots, label).await.is_none() {
                break;
            }
        }

        let Some(due) = slots
            .iter()
            .filter(|slot| slot.handle.is_some())
            .map(|slot| slot.next_due)
            .min()
        else {
            // Nothing re-opened after a reconnect; idle until the deadline.
            ctx.wait_for_deadline().await;
            break;
        };
        if !ctx.pace_until(due).await || ctx.expired() {
            break;
        }

        let now = Instant::now();
        for slot in slots.iter_mut().filter(|slot| slot.next_due <= now) {
            let Some(connection) = slot.handle.clone() else {
                continue;
            };
            let jitter = observed_jitter(slot.next_due, now);
            slot.next_due = instant_after(slot.next_due, slot.params.rpi).max(now);
            let payload = slot.next_payload(profile);
            let transport = slot.params.transport.as_str();

            let send = OpSpec::new(label, OperationKind::CyclicSend, &slot.params.name)
                .service_label(transport)
                .jitter(jitter);
            let Some((sent, send_rtt)) =
                ctx.timed(client.send_io_data(&connection, &payload)).await
            else {
                return Ok(());
            };
            ctx.record_status(&send, sent.as_ref().map(|()| 0), send_rtt);

            let receive = OpSpec::new(label, OperationKind::CyclicReceive, &slot.params.name)
                .service_label(transport)
                .jitter(jitter);
            let Some((received, receive_rtt)) =
                ctx.timed(client.receive_io_data(&connection)).await
            else {
                return Ok(());
            };
            ctx.record_status(&receive, received.as_ref().map(|_| 0), receive_rtt);

            if !client.is_connected() {
                break;
            }
        }
    }
    Ok(())
}

/// Forward-closes every open slot and records the close. Runs on every exit
/// path, so it ignores cancellation.
async fn close_all(
    ctx: &RunContext<'_>,
    client: &mut dyn Client,
    slots: &mut [CyclicSlot],
    label: &str,
) {
    for slot in slots.iter_mut() {
        let Some(connection) = slot.handle.take() else {
            continue;
        };
        if !client.is_connected() {
            continue;
        }
        let spec = OpSpec::new(label, OperationKind::ConnectionClose, &slot.params.name)
            .service(ServiceCode::FORWARD_CLOSE);
        let start = Instant::now();
        let closed = client.forward_close(&connection).await;
        ctx.record_status(&spec, closed.as_ref().map(|()| 0), start.elapsed());
    }
}
