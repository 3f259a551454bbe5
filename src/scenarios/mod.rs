//! Scenario execution engine.
//!
//! A [`Scenario`] drives a [`Client`] for at most `params.duration`,
//! recording one metric per attempted operation into `params.sink`. Only
//! connection-level failures end a run early; everything else is recorded and
//! the loop moves on.
mod baseline;
mod builtins;
mod churn;
mod context;
mod dpi;
mod edge;
mod evasion;
mod firewall;
mod io;
mod mixed;
mod params;
mod reconnect;
mod registry;
mod timing;
mod tunnel;

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod tests;

pub use params::{
    DEFAULT_DURATION, DEFAULT_INTERVAL, DEFAULT_PORT, JitterBounds, ScenarioParams,
    ScenarioParamsBuilder,
};
pub use reconnect::{DEFAULT_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY, ReconnectPolicy};
pub use registry::{ScenarioFactory, ScenarioRegistry, scenario_registry};
pub use timing::{MIN_PHASE_DURATION, observed_jitter, phase_duration, random_delay};

use async_trait::async_trait;

use crate::client::Client;
use crate::domain::TargetConfig;
use crate::error::ScenarioError;
use crate::shutdown::ShutdownSignal;

#[async_trait]
pub trait Scenario: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Runs the traffic pattern until the duration budget is spent or
    /// `shutdown` fires. Cancellation is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error when the initial connection fails, reconnection is
    /// exhausted, or the target configuration lacks what the scenario needs.
    async fn run(
        &self,
        shutdown: ShutdownSignal,
        client: &mut dyn Client,
        targets: &TargetConfig,
        params: &ScenarioParams,
    ) -> Result<(), ScenarioError>;
}
