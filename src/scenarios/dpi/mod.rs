//! Multi-phase DPI stress.
//!
//! Six weighted phases run back to back, each with its own sub-deadline of
//! `duration * weight` (never below one second). Within a phase every cycle
//! connects, issues the phase's steps with a random pause between them and
//! disconnects, so inspection engines see full session lifecycles. Each
//! phase records under a composite label such as
//! `dpi_explicit:phase_2_connection_lifecycle`.
mod phases;
mod probes;

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{Instrument, debug, info, warn};

use crate::client::{Client, IoConnectionParams};
use crate::domain::{ServiceCode, TargetConfig};
use crate::error::{ClientError, ScenarioError};
use crate::metrics::{ExpectedOutcome, OperationKind, duration_ms};
use crate::shutdown::ShutdownSignal;

use super::churn::SESSION_LABEL;
use super::context::{Call, OpSpec, RunContext, dispatch, release};
use super::timing::{instant_after, phase_duration};
use super::{Scenario, ScenarioParams};

pub(crate) use phases::{PHASES, phase_label};
use phases::{PhaseResult, log_phase_table};
use probes::{DpiStep, ViolationVerdict, phase_steps};

/// Sum of every phase budget; the run's overall deadline.
pub(crate) fn total_budget(duration: Duration) -> Duration {
    PHASES
        .iter()
        .map(|phase| phase_duration(duration, phase.weight()))
        .fold(Duration::ZERO, Duration::saturating_add)
}

#[derive(Debug, Default)]
pub(crate) struct DpiScenario;

#[async_trait]
impl Scenario for DpiScenario {
    fn name(&self) -> &'static str {
        "dpi_explicit"
    }

    fn description(&self) -> &'static str {
        "Six-phase DPI stress over explicit messaging with per-phase summaries"
    }

    async fn run(
        &self,
        shutdown: ShutdownSignal,
        client: &mut dyn Client,
        targets: &TargetConfig,
        params: &ScenarioParams,
    ) -> Result<(), ScenarioError> {
        let mut ctx = RunContext::with_budget(params, shutdown, total_budget(params.duration));
        let result = dpi_run(&mut ctx, client, targets, self.name())
            .instrument(params.span.clone())
            .await;
        release(client).await;
        result
    }
}

async fn dpi_run(
    ctx: &mut RunContext<'_>,
    client: &mut dyn Client,
    targets: &TargetConfig,
    scenario: &str,
) -> Result<(), ScenarioError> {
    let mut results: Vec<PhaseResult> = Vec::with_capacity(PHASES.len());
    let mut first_connect = true;
    for (index, kind) in PHASES.iter().copied().enumerate() {
        if ctx.is_cancelled() {
            break;
        }
        let label = phase_label(scenario, index, kind);
        let budget = phase_duration(ctx.params().duration, kind.weight());
        let steps = phase_steps(kind, targets);
        info!(
            "{}: starting, budget {:?}, {} steps per cycle",
            label,
            budget,
            steps.len()
        );

        let started = Instant::now();
        let mut phase = Phase {
            label: &label,
            deadline: instant_after(started, budget),
            result: PhaseResult::new(label.clone()),
        };
        let completed = phase.run(ctx, client, &steps, &mut first_connect).await?;
        phase.result.finalize(started.elapsed());
        results.push(phase.result);
        if !completed {
            break;
        }
    }
    log_phase_table(scenario, &results);
    Ok(())
}

struct Phase<'phase> {
    label: &'phase str,
    deadline: Instant,
    result: PhaseResult,
}

impl Phase<'_> {
    /// Loops connect, steps, disconnect until the sub-deadline. Returns
    /// `Ok(false)` when cancelled.
    async fn run(
        &mut self,
        ctx: &mut RunContext<'_>,
        client: &mut dyn Client,
        steps: &[DpiStep],
        first_connect: &mut bool,
    ) -> Result<bool, ScenarioError> {
        let host = ctx.params().host.clone();
        let port = ctx.params().port;
        let endpoint = format!("{}:{}", host, port);

        while Instant::now() < self.deadline {
            if ctx.is_cancelled() {
                return Ok(false);
            }
            let open = OpSpec::new(self.label, OperationKind::ConnectionOpen, &endpoint)
                .service_label(SESSION_LABEL);
            let Some((connected, rtt)) = ctx.timed(client.connect(&host, port)).await else {
                return Ok(false);
            };
            if let Err(err) = connected {
                if *first_connect {
                    return Err(ScenarioError::InitialConnect {
                        host,
                        port,
                        source: err,
                    });
                }
                self.absorb(ctx, &open, Err(&err), rtt);
                if !ctx.jitter_pause_within(self.deadline).await {
                    return Ok(false);
                }
                continue;
            }
            *first_connect = false;
            self.absorb(ctx, &open, Ok(0), rtt);

            for (idx, step) in steps.iter().enumerate() {
                if Instant::now() >= self.deadline {
                    break;
                }
                if idx > 0 && !ctx.jitter_pause_within(self.deadline).await {
                    return Ok(false);
                }
                if !self.step(ctx, client, step).await {
                    return Ok(false);
                }
                if !client.is_connected() {
                    break;
                }
            }

            if client.is_connected() {
                let close = OpSpec::new(self.label, OperationKind::ConnectionClose, &endpoint)
                    .service_label(SESSION_LABEL);
                let Some((closed, close_rtt)) = ctx.timed(client.disconnect()).await else {
                    return Ok(false);
                };
                self.absorb(ctx, &close, closed.as_ref().map(|()| 0), close_rtt);
            }
            if !ctx.jitter_pause_within(self.deadline).await {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn absorb(
        &mut self,
        ctx: &RunContext<'_>,
        spec: &OpSpec<'_>,
        status: Result<u8, &ClientError>,
        rtt: Duration,
    ) {
        let success = matches!(status, Ok(0));
        let reset = status.as_ref().is_err_and(|err| err.is_reset());
        let outcome = ctx.record_status(spec, status, rtt);
        self.result.absorb(success, outcome, reset, duration_ms(rtt));
    }

    /// Issues one step and records it. Returns `false` when cancelled.
    async fn step(
        &mut self,
        ctx: &mut RunContext<'_>,
        client: &mut dyn Client,
        step: &DpiStep,
    ) -> bool {
        match step {
            DpiStep::Request {
                name,
                kind,
                request,
                expected,
            } => {
                let mut spec = OpSpec::new(self.label, *kind, name).service(request.service);
                if let Some(expected) = expected {
                    spec = spec.expected(*expected);
                }
                let Some((result, rtt)) = ctx.timed(dispatch(client, Call::Invoke(request))).await
                else {
                    return false;
                };
                self.absorb(ctx, &spec, result.as_ref().map(|response| response.status), rtt);
                true
            }
            DpiStep::Violation { name, request } => {
                let spec = OpSpec::new(self.label, OperationKind::Custom, name)
                    .service(request.service)
                    .expected(ExpectedOutcome::Error);
                let Some((result, rtt)) = ctx.timed(dispatch(client, Call::Invoke(request))).await
                else {
                    return false;
                };
                let verdict = ViolationVerdict::classify(&result);
                match &verdict {
                    ViolationVerdict::Rejected(status) => {
                        debug!("{}: {} rejected with 0x{:02X}", self.label, name, status);
                    }
                    ViolationVerdict::Dropped(err) => {
                        warn!(
                            "{}: {} got no protocol answer ({}), possible silent drop or active block",
                            self.label, name, err
                        );
                    }
                    ViolationVerdict::Accepted => {
                        warn!(
                            "{}: {} was accepted, security concern (possible false negative)",
                            self.label, name
                        );
                    }
                }
                let metric = verdict.apply(ctx.metric(&spec).with_rtt(rtt));
                let reset = result.as_ref().is_err_and(|err| err.is_reset());
                self.result.absorb(false, metric.outcome, reset, metric.rtt_ms);
                ctx.params().sink.record(metric);
                true
            }
            DpiStep::OpenClose(params) => self.open_close(ctx, client, params).await,
        }
    }

    async fn open_close(
        &mut self,
        ctx: &mut RunContext<'_>,
        client: &mut dyn Client,
        params: &IoConnectionParams,
    ) -> bool {
        let open = OpSpec::new(self.label, OperationKind::ConnectionOpen, &params.name)
            .service(ServiceCode::FORWARD_OPEN);
        let Some((opened, rtt)) = ctx.timed(client.forward_open(params)).await else {
            return false;
        };
        self.absorb(ctx, &open, opened.as_ref().map(|_| 0), rtt);
        let Ok(connection) = opened else {
            return true;
        };
        let close = OpSpec::new(self.label, OperationKind::ConnectionClose, &params.name)
            .service(ServiceCode::FORWARD_CLOSE);
        let Some((closed, close_rtt)) = ctx.timed(client.forward_close(&connection)).await else {
            return false;
        };
        self.absorb(ctx, &close, closed.as_ref().map(|()| 0), close_rtt);
        true
    }
}
