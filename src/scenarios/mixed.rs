use async_trait::async_trait;
use tracing::{Instrument, debug, info};

use crate::client::{Client, ServiceRequest};
use crate::domain::{
    CustomTarget, ProtocolProfile, ReadTarget, ServiceCode, TargetConfig, WritePattern,
    WriteTarget,
};
use crate::error::ScenarioError;
use crate::metrics::OperationKind;
use crate::shutdown::ShutdownSignal;

use super::context::{Call, OpSpec, RunContext, release};
use super::reconnect::{Link, connect_initial, ensure_connected};
use super::timing::Pacer;
use super::{Scenario, ScenarioParams};

/// Value generator for one write target. Survives reconnects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WriteState {
    counter: u64,
    toggled: bool,
}

impl WriteState {
    pub(crate) const fn new(target: &WriteTarget) -> Self {
        Self {
            counter: target.initial,
            toggled: target.initial != 0,
        }
    }

    /// Produces the next payload for `target`, encoded with `profile`.
    pub(crate) fn next_value(&mut self, target: &WriteTarget, profile: ProtocolProfile) -> Vec<u8> {
        match &target.pattern {
            WritePattern::Increment => {
                let value = profile.encode_value(self.counter, target.width);
                self.counter = self.counter.wrapping_add(1);
                value
            }
            WritePattern::Toggle => {
                self.toggled = !self.toggled;
                profile.encode_value(u64::from(self.toggled), target.width)
            }
            WritePattern::Constant(bytes) => bytes.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Step<'target> {
    Read(&'target ReadTarget),
    Write(usize),
    Custom(&'target CustomTarget),
}

/// Round-robin interleaving: first read, first write, first custom, then the
/// second of each, and so on.
fn interleave<'target>(
    reads: &'target [ReadTarget],
    writes: &[&WriteTarget],
    customs: &[&'target CustomTarget],
) -> Vec<Step<'target>> {
    let longest = reads.len().max(writes.len()).max(customs.len());
    let mut steps = Vec::with_capacity(
        reads
            .len()
            .saturating_add(writes.len())
            .saturating_add(customs.len()),
    );
    for idx in 0..longest {
        if let Some(read) = reads.get(idx) {
            steps.push(Step::Read(read));
        }
        if idx < writes.len() {
            steps.push(Step::Write(idx));
        }
        if let Some(custom) = customs.get(idx) {
            steps.push(Step::Custom(custom));
        }
    }
    steps
}

/// Interleaves reads, patterned writes and custom services every interval.
#[derive(Debug, Default)]
pub(crate) struct MixedScenario;

#[async_trait]
impl Scenario for MixedScenario {
    fn name(&self) -> &'static str {
        "mixed"
    }

    fn description(&self) -> &'static str {
        "Interleaved reads, patterned writes and custom services"
    }

    async fn run(
        &self,
        shutdown: ShutdownSignal,
        client: &mut dyn Client,
        targets: &TargetConfig,
        params: &ScenarioParams,
    ) -> Result<(), ScenarioError> {
        let mut ctx = RunContext::new(params, shutdown);
        let result = mixed_loop(&mut ctx, client, targets, self.name())
            .instrument(params.span.clone())
            .await;
        release(client).await;
        result
    }
}

async fn mixed_loop(
    ctx: &mut RunContext<'_>,
    client: &mut dyn Client,
    targets: &TargetConfig,
    label: &str,
) -> Result<(), ScenarioError> {
    let writes: Vec<&WriteTarget> = targets.writes().collect();
    let customs: Vec<&CustomTarget> = targets.customs().collect();
    let reads = if writes.is_empty() && customs.is_empty() {
        targets.reads_or_identity()
    } else {
        targets.reads().cloned().collect()
    };
    let mut states: Vec<WriteState> = writes.iter().map(|target| WriteState::new(target)).collect();
    let steps = interleave(&reads, &writes, &customs);
    let profile = ctx.params().profile;

    if connect_initial(ctx, client).await? == Link::Cancelled {
        return Ok(());
    }
    info!(
        "{}: {} reads, {} writes, {} custom services per cycle ({} profile)",
        label,
        reads.len(),
        writes.len(),
        customs.len(),
        profile.as_str()
    );

    let mut pacer = Pacer::new(ctx.params().interval);
    while !ctx.should_stop() {
        let jitter = pacer.begin();
        if !ensure_connected(ctx, client).await?.is_up() {
            break;
        }
        for step in &steps {
            let completed = match *step {
                Step::Read(target) => {
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
                    ctx.call(client, &spec, call).await.is_some()
                }
                Step::Write(idx) => {
                    let (Some(target), Some(state)) = (writes.get(idx), states.get_mut(idx)) else {
                        continue;
                    };
                    let value = state.next_value(target, profile);
                    debug!("{}: writing {:02X?} to {}", label, value, target.name);
                    let spec = OpSpec::new(label, OperationKind::Write, &target.name)
                        .service(target.service)
                        .jitter(jitter);
                    let request = ServiceRequest::new(target.service, target.path, value);
                    let call = if target.service == ServiceCode::SET_ATTRIBUTE_SINGLE {
                        Call::Write(&target.path, &request.data)
                    } else {
                        Call::Invoke(&request)
                    };
                    ctx.call(client, &spec, call).await.is_some()
                }
                Step::Custom(target) => {
                    let spec = OpSpec::new(label, OperationKind::Custom, &target.name)
                        .service(target.service)
                        .jitter(jitter);
                    let request =
                        ServiceRequest::new(target.service, target.path, target.payload.clone());
                    ctx.call(client, &spec, Call::Invoke(&request)).await.is_some()
                }
            };
            if !completed {
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
