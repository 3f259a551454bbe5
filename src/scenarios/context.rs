//! Per-run clock, cancellation and metric plumbing shared by every scenario.
use std::future::Future;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

use crate::client::{Client, ServiceRequest, ServiceResponse};
use crate::domain::{CipPath, ServiceCode};
use crate::error::{ClientError, ClientResult};
use crate::metrics::{ExpectedOutcome, Metric, OperationKind, Outcome, duration_ms};
use crate::shutdown::ShutdownSignal;

use super::params::ScenarioParams;
use super::timing::{instant_after, random_delay};

/// Describes one operation for the metric it will produce.
#[derive(Debug, Clone)]
pub(crate) struct OpSpec<'op> {
    pub(crate) label: &'op str,
    pub(crate) kind: OperationKind,
    pub(crate) target: &'op str,
    pub(crate) service: String,
    pub(crate) expected: Option<ExpectedOutcome>,
    pub(crate) jitter_ms: f64,
}

impl<'op> OpSpec<'op> {
    pub(crate) const fn new(label: &'op str, kind: OperationKind, target: &'op str) -> Self {
        Self {
            label,
            kind,
            target,
            service: String::new(),
            expected: None,
            jitter_ms: 0.0,
        }
    }

    pub(crate) fn service(mut self, service: ServiceCode) -> Self {
        self.service = service.label();
        self
    }

    pub(crate) fn service_label(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    pub(crate) fn expected(mut self, expected: ExpectedOutcome) -> Self {
        self.expected = Some(expected);
        self
    }

    pub(crate) fn jitter(mut self, jitter: Duration) -> Self {
        self.jitter_ms = duration_ms(jitter);
        self
    }
}

/// The three request shapes a scenario issues through the client.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Call<'call> {
    Read(&'call CipPath),
    Write(&'call CipPath, &'call [u8]),
    Invoke(&'call ServiceRequest),
}

pub(crate) async fn dispatch(
    client: &mut dyn Client,
    call: Call<'_>,
) -> ClientResult<ServiceResponse> {
    match call {
        Call::Read(path) => client.read_attribute(path).await,
        Call::Write(path, data) => client.write_attribute(path, data).await,
        Call::Invoke(request) => client.invoke_service(request).await,
    }
}

/// Disconnects if a connection is up. Never cancel-aware: release must
/// happen on every exit path.
pub(crate) async fn release(client: &mut dyn Client) {
    if !client.is_connected() {
        return;
    }
    if let Err(err) = client.disconnect().await {
        debug!("Disconnect failed during release: {}", err);
    }
}

/// Clock and cancellation state for one `run` call.
///
/// Every suspension point goes through [`RunContext::pause_until`] or
/// [`RunContext::attempt`], so cancellation interrupts sleeps and in-flight
/// operations alike. Operations abandoned that way produce no metric.
pub(crate) struct RunContext<'run> {
    params: &'run ScenarioParams,
    shutdown: ShutdownSignal,
    started: Instant,
    deadline: Instant,
    rng: StdRng,
}

impl<'run> RunContext<'run> {
    pub(crate) fn new(params: &'run ScenarioParams, shutdown: ShutdownSignal) -> Self {
        Self::with_budget(params, shutdown, params.duration)
    }

    /// Context whose deadline is `budget` from now instead of
    /// `params.duration`; phased scenarios use the sum of their phase budgets.
    pub(crate) fn with_budget(
        params: &'run ScenarioParams,
        shutdown: ShutdownSignal,
        budget: Duration,
    ) -> Self {
        let started = Instant::now();
        Self {
            params,
            shutdown,
            started,
            deadline: instant_after(started, budget),
            rng: StdRng::from_entropy(),
        }
    }

    pub(crate) const fn params(&self) -> &'run ScenarioParams {
        self.params
    }

    pub(crate) const fn deadline(&self) -> Instant {
        self.deadline
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub(crate) fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub(crate) fn is_cancelled(&mut self) -> bool {
        self.shutdown.is_triggered()
    }

    pub(crate) fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub(crate) fn should_stop(&mut self) -> bool {
        self.is_cancelled() || self.expired()
    }

    /// Sleeps until `at`. Returns `false` when cancelled first.
    pub(crate) async fn pause_until(&mut self, at: Instant) -> bool {
        if self.shutdown.is_triggered() {
            return false;
        }
        tokio::select! {
            () = sleep_until(at) => true,
            () = self.shutdown.triggered() => false,
        }
    }

    /// Like [`RunContext::pause_until`] but never past the run deadline.
    pub(crate) async fn pace_until(&mut self, at: Instant) -> bool {
        let wake = at.min(self.deadline);
        self.pause_until(wake).await
    }

    /// Randomized inter-operation pause drawn from the jitter bounds.
    pub(crate) async fn jitter_pause(&mut self) -> bool {
        let deadline = self.deadline;
        self.jitter_pause_within(deadline).await
    }

    /// [`RunContext::jitter_pause`] that never sleeps past `limit`.
    pub(crate) async fn jitter_pause_within(&mut self, limit: Instant) -> bool {
        let bounds = self.params.jitter;
        let delay = random_delay(&mut self.rng, bounds.min, bounds.max);
        if delay.is_zero() {
            return !self.is_cancelled();
        }
        let wake = instant_after(Instant::now(), delay).min(limit);
        self.pace_until(wake).await
    }

    /// Sleeps out the rest of the run unless cancelled.
    pub(crate) async fn wait_for_deadline(&mut self) -> bool {
        let deadline = self.deadline;
        self.pause_until(deadline).await
    }

    /// Races `operation` against cancellation.
    pub(crate) async fn attempt<F>(&mut self, operation: F) -> Option<F::Output>
    where
        F: Future,
    {
        if self.shutdown.is_triggered() {
            return None;
        }
        tokio::select! {
            output = operation => Some(output),
            () = self.shutdown.triggered() => None,
        }
    }

    /// [`RunContext::attempt`] plus the elapsed round-trip time.
    pub(crate) async fn timed<F, T>(&mut self, operation: F) -> Option<(ClientResult<T>, Duration)>
    where
        F: Future<Output = ClientResult<T>>,
    {
        let start = Instant::now();
        let output = self.attempt(operation).await?;
        Some((output, start.elapsed()))
    }

    pub(crate) fn metric(&self, spec: &OpSpec<'_>) -> Metric {
        let metric = Metric::new(
            spec.label,
            self.params.target_type,
            spec.kind,
            spec.target,
            spec.service.as_str(),
        )
        .with_jitter_ms(spec.jitter_ms);
        match spec.expected {
            Some(expected) => metric.with_expected(expected),
            None => metric,
        }
    }

    pub(crate) fn record(&self, metric: Metric) {
        if metric.success {
            debug!(
                "{} {} ok in {:.2}ms",
                metric.scenario, metric.target_name, metric.rtt_ms
            );
        } else {
            let error = if metric.error.is_empty() {
                format!("status 0x{:02X}", metric.status)
            } else {
                metric.error.clone()
            };
            warn!(
                "{} {} failed: {} (rtt {:.2}ms)",
                metric.scenario, metric.target_name, error, metric.rtt_ms
            );
        }
        self.params.sink.record(metric);
    }

    /// Records the result of one operation. `Ok(status)` is a response with
    /// that status byte, `Err` a transport-level failure.
    pub(crate) fn record_status(
        &self,
        spec: &OpSpec<'_>,
        status: Result<u8, &ClientError>,
        rtt: Duration,
    ) -> Outcome {
        let base = self.metric(spec).with_rtt(rtt);
        let metric = match status {
            Ok(0) => base,
            Ok(code) => base.failed(code, ""),
            Err(err) => base.failed(0, err.to_string()),
        };
        let outcome = metric.outcome;
        self.record(metric);
        outcome
    }

    /// Issues `call`, records exactly one metric for it and hands back the
    /// client result. `None` means the run was cancelled mid-flight.
    pub(crate) async fn call(
        &mut self,
        client: &mut dyn Client,
        spec: &OpSpec<'_>,
        call: Call<'_>,
    ) -> Option<ClientResult<ServiceResponse>> {
        let (result, rtt) = self.timed(dispatch(client, call)).await?;
        self.record_status(spec, result.as_ref().map(|response| response.status), rtt);
        Some(result)
    }
}
