use async_trait::async_trait;
use tracing::{Instrument, info};

use crate::client::{Client, ServiceRequest};
use crate::domain::{ReadTarget, ServiceCode, TargetConfig};
use crate::error::ScenarioError;
use crate::metrics::OperationKind;
use crate::shutdown::ShutdownSignal;

use super::context::{Call, OpSpec, RunContext, release};
use super::reconnect::{Link, connect_initial, ensure_connected};
use super::timing::Pacer;
use super::{Scenario, ScenarioParams};

/// Polls every read target once per interval for the whole run.
#[derive(Debug, Default)]
pub(crate) struct BaselineScenario;

#[async_trait]
impl Scenario for BaselineScenario {
    fn name(&self) -> &'static str {
        "baseline"
    }

    fn description(&self) -> &'static str {
        "Steady polling of every read target once per interval"
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
        let result = poll_loop(&mut ctx, client, &reads, self.name())
            .instrument(params.span.clone())
            .await;
        release(client).await;
        result
    }
}

/// Shared steady-polling loop; `label` names the metrics it records.
pub(crate) async fn poll_loop(
    ctx: &mut RunContext<'_>,
    client: &mut dyn Client,
    reads: &[ReadTarget],
    label: &str,
) -> Result<(), ScenarioError> {
    if connect_initial(ctx, client).await? == Link::Cancelled {
        return Ok(());
    }
    info!(
        "{}: polling {} targets every {:?} for {:?}",
        label,
        reads.len(),
        ctx.params().interval,
        ctx.params().duration
    );

    let mut pacer = Pacer::new(ctx.params().interval);
    let mut cycles: u64 = 0;
    while !ctx.should_stop() {
        let jitter = pacer.begin();
        if !ensure_connected(ctx, client).await?.is_up() {
            break;
        }
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
            if ctx.call(client, &spec, call).await.is_none() {
                return Ok(());
            }
            if !client.is_connected() {
                break;
            }
        }
        cycles = cycles.saturating_add(1);
        let wake = pacer.advance();
        if !ctx.pace_until(wake).await {
            break;
        }
    }
    info!("{}: finished {} polling cycles in {:?}", label, cycles, ctx.elapsed());
    Ok(())
}
