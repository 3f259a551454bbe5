use async_trait::async_trait;
use tracing::{Instrument, info, warn};

use crate::client::{Client, ServiceRequest};
use crate::domain::{EdgeTarget, TargetConfig};
use crate::error::ScenarioError;
use crate::metrics::{ExpectedOutcome, OperationKind};
use crate::shutdown::ShutdownSignal;

use super::context::{Call, OpSpec, RunContext, dispatch, release};
use super::reconnect::{Link, connect_initial, ensure_connected};
use super::timing::Pacer;
use super::{Scenario, ScenarioParams};

/// One request with the outcome the device is supposed to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Probe {
    pub(crate) name: String,
    pub(crate) request: ServiceRequest,
    pub(crate) expected: ExpectedOutcome,
}

impl Probe {
    pub(crate) fn new(
        name: impl Into<String>,
        request: ServiceRequest,
        expected: ExpectedOutcome,
    ) -> Self {
        Self {
            name: name.into(),
            request,
            expected,
        }
    }
}

impl From<&EdgeTarget> for Probe {
    fn from(target: &EdgeTarget) -> Self {
        Self::new(
            target.name.clone(),
            ServiceRequest::new(target.service, target.path, target.payload.clone()),
            target.expected_outcome,
        )
    }
}

/// Replays `probes` every interval until the deadline, recording each with
/// its expected outcome. Mismatches are logged as findings, never fatal.
pub(crate) async fn probe_loop(
    ctx: &mut RunContext<'_>,
    client: &mut dyn Client,
    probes: &[Probe],
    label: &str,
) -> Result<(), ScenarioError> {
    if connect_initial(ctx, client).await? == Link::Cancelled {
        return Ok(());
    }
    info!("{}: {} probes per cycle", label, probes.len());

    let mut pacer = Pacer::new(ctx.params().interval);
    let mut mismatches: u64 = 0;
    while !ctx.should_stop() {
        let jitter = pacer.begin();
        if !ensure_connected(ctx, client).await?.is_up() {
            break;
        }
        for (idx, probe) in probes.iter().enumerate() {
            if idx > 0 && !ctx.jitter_pause().await {
                return Ok(());
            }
            let spec = OpSpec::new(label, OperationKind::Custom, &probe.name)
                .service(probe.request.service)
                .expected(probe.expected)
                .jitter(jitter);
            let Some((result, rtt)) = ctx
                .timed(dispatch(client, Call::Invoke(&probe.request)))
                .await
            else {
                return Ok(());
            };
            let status = result.as_ref().map(|response| response.status);
            let outcome = ctx.record_status(&spec, status, rtt);
            if probe.expected.is_misclassified(outcome) {
                mismatches = mismatches.saturating_add(1);
                warn!(
                    "{}: {} expected {} but observed {}",
                    label,
                    probe.name,
                    probe.expected.as_str(),
                    outcome.as_str()
                );
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
    info!("{}: {} unexpected outcomes", label, mismatches);
    Ok(())
}

/// Vendor edge cases from the catalog's edge targets.
#[derive(Debug, Default)]
pub(crate) struct EdgeScenario;

#[async_trait]
impl Scenario for EdgeScenario {
    fn name(&self) -> &'static str {
        "edge"
    }

    fn description(&self) -> &'static str {
        "Vendor edge cases: replay edge targets and compare against their expected outcome"
    }

    async fn run(
        &self,
        shutdown: ShutdownSignal,
        client: &mut dyn Client,
        targets: &TargetConfig,
        params: &ScenarioParams,
    ) -> Result<(), ScenarioError> {
        let probes: Vec<Probe> = targets.edges().map(Probe::from).collect();
        if probes.is_empty() {
            return Err(ScenarioError::NoTargets {
                scenario: self.name(),
                kind: "edge",
            });
        }
        let mut ctx = RunContext::new(params, shutdown);
        let result = probe_loop(&mut ctx, client, &probes, self.name())
            .instrument(params.span.clone())
            .await;
        release(client).await;
        result
    }
}
