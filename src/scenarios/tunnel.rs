use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{Instrument, info};

use crate::client::{Client, IoConnection, IoConnectionParams, ServiceRequest};
use crate::domain::{CipPath, IoTransport, ReadTarget, ServiceCode, TargetConfig};
use crate::error::{ClientError, ScenarioError};
use crate::metrics::OperationKind;
use crate::shutdown::ShutdownSignal;

use super::context::{Call, OpSpec, RunContext, release};
use super::reconnect::{Link, connect_initial, ensure_connected};
use super::timing::Pacer;
use super::{Scenario, ScenarioParams};

/// Backplane slot Unconnected Send routes to.
const ROUTE_SLOT: u8 = 0;
const CLASS3_SIZE: usize = 500;
const CLASS3_RPI: Duration = Duration::from_millis(2_500);

/// Wraps every read in an Unconnected Send addressed to the Connection
/// Manager, so inspection has to look through one level of routing.
#[derive(Debug, Default)]
pub(crate) struct UcmmTunnelScenario;

#[async_trait]
impl Scenario for UcmmTunnelScenario {
    fn name(&self) -> &'static str {
        "tunnel_ucmm"
    }

    fn description(&self) -> &'static str {
        "Reads routed through Unconnected Send via the Connection Manager"
    }

    async fn run(
        &self,
        shutdown: ShutdownSignal,
        client: &mut dyn Client,
        targets: &TargetConfig,
        params: &ScenarioParams,
    ) -> Result<(), ScenarioError> {
        let reads = targets.reads_or_identity();
        let mut ctx = RunContext::new(params, shutdown);
        let result = ucmm_loop(&mut ctx, client, &reads, self.name())
            .instrument(params.span.clone())
            .await;
        release(client).await;
        result
    }
}

async fn ucmm_loop(
    ctx: &mut RunContext<'_>,
    client: &mut dyn Client,
    reads: &[ReadTarget],
    label: &str,
) -> Result<(), ScenarioError> {
    if connect_initial(ctx, client).await? == Link::Cancelled {
        return Ok(());
    }
    let routed: Vec<ServiceRequest> = reads
        .iter()
        .map(|target| {
            let inner = ServiceRequest::new(target.service, target.path, Vec::new());
            ServiceRequest::unconnected_send(inner, ROUTE_SLOT)
        })
        .collect();

    let mut pacer = Pacer::new(ctx.params().interval);
    while !ctx.should_stop() {
        let jitter = pacer.begin();
        if !ensure_connected(ctx, client).await?.is_up() {
            break;
        }
        for (target, request) in reads.iter().zip(&routed) {
            let spec = OpSpec::new(label, OperationKind::Read, &target.name)
                .service(ServiceCode::UNCONNECTED_SEND)
                .jitter(jitter);
            if ctx.call(client, &spec, Call::Invoke(request)).await.is_none() {
                return Ok(());
            }
            if !client.is_connected() {
                break;
            }
        }
        let wake = pacer.advance();
        if !ctx.pace_until(wake).await {
            break;
        }
    }
    Ok(())
}

/// Explicit reads carried while a class-3 connection to the Message Router
/// is held open. The connection is re-opened after every reconnect.
#[derive(Debug, Default)]
pub(crate) struct ConnectedTunnelScenario;

#[async_trait]
impl Scenario for ConnectedTunnelScenario {
    fn name(&self) -> &'static str {
        "tunnel_connected"
    }

    fn description(&self) -> &'static str {
        "Class-3 connected explicit messaging over a forward-opened connection"
    }

    async fn run(
        &self,
        shutdown: ShutdownSignal,
        client: &mut dyn Client,
        targets: &TargetConfig,
        params: &ScenarioParams,
    ) -> Result<(), ScenarioError> {
        let reads = targets.reads_or_identity();
        let class3 = class3_params(targets);
        let mut connection = None;
        let mut ctx = RunContext::new(params, shutdown);
        let result = connected_loop(
            &mut ctx,
            client,
            &reads,
            &class3,
            &mut connection,
            self.name(),
        )
        .instrument(params.span.clone())
        .await;
        if let Some(open) = connection
            && client.is_connected()
        {
            let spec = OpSpec::new(self.name(), OperationKind::ConnectionClose, &class3.name)
                .service(ServiceCode::FORWARD_CLOSE);
            let start = Instant::now();
            let closed = client.forward_close(&open).await;
            ctx.record_status(&spec, closed.as_ref().map(|()| 0), start.elapsed());
        }
        release(client).await;
        result
    }
}

/// First configured class-3 connection, or a default one to the Message
/// Router.
fn class3_params(targets: &TargetConfig) -> IoConnectionParams {
    targets
        .io
        .as_ref()
        .and_then(|io| {
            io.connections
                .iter()
                .find(|config| config.transport == IoTransport::Class3)
        })
        .map_or_else(
            || IoConnectionParams {
                name: "class3_message_router".to_owned(),
                rpi: CLASS3_RPI,
                o_to_t_size: CLASS3_SIZE,
                t_to_o_size: CLASS3_SIZE,
                transport: IoTransport::Class3,
                connection_point: CipPath::MESSAGE_ROUTER,
            },
            IoConnectionParams::from,
        )
}

/// Opens the class-3 connection, recording the attempt. A rejected open on
/// the first try is fatal; later rejections are recorded and retried.
async fn open_class3(
    ctx: &mut RunContext<'_>,
    client: &mut dyn Client,
    params: &IoConnectionParams,
    label: &str,
) -> Option<Result<IoConnection, ClientError>> {
    let spec = OpSpec::new(label, OperationKind::ConnectionOpen, &params.name)
        .service(ServiceCode::FORWARD_OPEN);
    let (opened, rtt) = ctx.timed(client.forward_open(params)).await?;
    ctx.record_status(&spec, opened.as_ref().map(|_| 0), rtt);
    Some(opened)
}

async fn connected_loop(
    ctx: &mut RunContext<'_>,
    client: &mut dyn Client,
    reads: &[ReadTarget],
    class3: &IoConnectionParams,
    connection: &mut Option<IoConnection>,
    label: &str,
) -> Result<(), ScenarioError> {
    if connect_initial(ctx, client).await? == Link::Cancelled {
        return Ok(());
    }
    let Some(first) = open_class3(ctx, client, class3, label).await else {
        return Ok(());
    };
    let opened = first?;
    info!(
        "{}: class-3 connection {} open (O->T 0x{:08X})",
        label, class3.name, opened.o_to_t_id
    );
    *connection = Some(opened);

    let mut pacer = Pacer::new(ctx.params().interval);
    while !ctx.should_stop() {
        let jitter = pacer.begin();
        if !client.is_connected() {
            *connection = None;
            if !ensure_connected(ctx, client).await?.is_up() {
                break;
            }
        }
        if connection.is_none() {
            match open_class3(ctx, client, class3, label).await {
                None => break,
                Some(Ok(opened)) => *connection = Some(opened),
                Some(Err(_)) => {}
            }
        }
        if connection.is_some() {
            for target in reads {
                let spec = OpSpec::new(label, OperationKind::Read, &target.name)
                    .service(target.service)
                    .jitter(jitter);
                let request = ServiceRequest::new(target.service, target.path, Vec::new());
                if ctx.call(client, &spec, Call::Invoke(&request)).await.is_none() {
                    return Ok(());
                }
                if !client.is_connected() {
                    break;
                }
            }
        }
        let wake = pacer.advance();
        if !ctx.pace_until(wake).await {
            break;
        }
    }
    Ok(())
}
