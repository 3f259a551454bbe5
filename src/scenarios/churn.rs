use async_trait::async_trait;
use tracing::{Instrument, info};

use crate::client::{Client, ServiceRequest};
use crate::domain::{ReadTarget, ServiceCode, TargetConfig};
use crate::error::ScenarioError;
use crate::metrics::OperationKind;
use crate::shutdown::ShutdownSignal;

use super::context::{Call, OpSpec, RunContext, release};
use super::timing::Pacer;
use super::{Scenario, ScenarioParams};

/// Service label stamped on connection open/close metrics.
pub(crate) const SESSION_LABEL: &str = "session";

/// Repeated connect, burst, disconnect cycles. Connect failures are recorded
/// and retried on the next interval; nothing here is fatal.
#[derive(Debug, Default)]
pub(crate) struct ChurnScenario;

#[async_trait]
impl Scenario for ChurnScenario {
    fn name(&self) -> &'static str {
        "churn"
    }

    fn description(&self) -> &'static str {
        "Connection churn: connect, read burst, disconnect, every interval"
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
        churn_loop(&mut ctx, client, &reads, self.name())
            .instrument(params.span.clone())
            .await;
        release(client).await;
        Ok(())
    }
}

async fn churn_loop(
    ctx: &mut RunContext<'_>,
    client: &mut dyn Client,
    reads: &[ReadTarget],
    label: &str,
) {
    let host = ctx.params().host.clone();
    let port = ctx.params().port;
    let endpoint = format!("{}:{}", host, port);
    let mut pacer = Pacer::new(ctx.params().interval);
    let mut cycles: u64 = 0;
    let mut refused: u64 = 0;

    while !ctx.should_stop() {
        let jitter = pacer.begin();
        let open = OpSpec::new(label, OperationKind::ConnectionOpen, &endpoint)
            .service_label(SESSION_LABEL)
            .jitter(jitter);
        let Some((connected, rtt)) = ctx.timed(client.connect(&host, port)).await else {
            break;
        };
        ctx.record_status(&open, connected.as_ref().map(|()| 0), rtt);

        if connected.is_ok() {
            for target in reads {
                let spec = OpSpec::new(label, OperationKind::Read, &target.name)
                    .service(target.service)
                    .jitter(jitter);
                let request;
                let call = if target.service == ServiceCode::GET_ATTRIBUTE_SINGLE {
                    Call::Read(&target.path)
                } else {
                    request = ServiceRequest::new(target.service, target.path, Vec::new());
                    Call::Invoke(&request)
                };
                if ctx.call(client, &spec, call).await.is_none() || !client.is_connected() {
                    break;
                }
            }
            if client.is_connected() {
                let close = OpSpec::new(label, OperationKind::ConnectionClose, &endpoint)
                    .service_label(SESSION_LABEL)
                    .jitter(jitter);
                let Some((closed, close_rtt)) = ctx.timed(client.disconnect()).await else {
                    break;
                };
                ctx.record_status(&close, closed.as_ref().map(|()| 0), close_rtt);
            }
            cycles = cycles.saturating_add(1);
        } else {
            refused = refused.saturating_add(1);
        }

        let wake = pacer.advance();
        if !ctx.pace_until(wake).await {
            break;
        }
    }
    info!(
        "{}: {} churn cycles, {} refused connects in {:?}",
        label,
        cycles,
        refused,
        ctx.elapsed()
    );
}
