use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::Span;

use crate::domain::{ProtocolProfile, TargetType};
use crate::metrics::MetricsSink;

use super::reconnect::ReconnectPolicy;

pub const DEFAULT_PORT: u16 = 44818;
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_DURATION: Duration = Duration::from_secs(60);
pub const DEFAULT_JITTER_MIN: Duration = Duration::from_millis(10);
pub const DEFAULT_JITTER_MAX: Duration = Duration::from_millis(50);

/// Uniform bounds for the randomized pause inserted between operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JitterBounds {
    pub min: Duration,
    pub max: Duration,
}

impl JitterBounds {
    #[must_use]
    pub const fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// No pause at all.
    #[must_use]
    pub const fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }
}

impl Default for JitterBounds {
    fn default() -> Self {
        Self::new(DEFAULT_JITTER_MIN, DEFAULT_JITTER_MAX)
    }
}

/// Immutable configuration for one scenario run.
#[derive(Clone)]
pub struct ScenarioParams {
    pub host: String,
    pub port: u16,
    pub interval: Duration,
    pub duration: Duration,
    pub sink: Arc<dyn MetricsSink>,
    pub target_type: TargetType,
    pub profile: ProtocolProfile,
    pub span: Span,
    pub reconnect: ReconnectPolicy,
    pub jitter: JitterBounds,
}

impl fmt::Debug for ScenarioParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScenarioParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("interval", &self.interval)
            .field("duration", &self.duration)
            .field("target_type", &self.target_type)
            .field("profile", &self.profile)
            .field("reconnect", &self.reconnect)
            .field("jitter", &self.jitter)
            .finish_non_exhaustive()
    }
}

impl ScenarioParams {
    #[must_use]
    pub fn builder(sink: Arc<dyn MetricsSink>) -> ScenarioParamsBuilder {
        ScenarioParamsBuilder::new(sink)
    }
}

pub struct ScenarioParamsBuilder {
    params: ScenarioParams,
}

impl ScenarioParamsBuilder {
    fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            params: ScenarioParams {
                host: "127.0.0.1".to_owned(),
                port: DEFAULT_PORT,
                interval: DEFAULT_INTERVAL,
                duration: DEFAULT_DURATION,
                sink,
                target_type: TargetType::EmulatedAdapter,
                profile: ProtocolProfile::Standard,
                span: Span::none(),
                reconnect: ReconnectPolicy::default(),
                jitter: JitterBounds::default(),
            },
        }
    }

    #[must_use]
    pub fn target(mut self, host: impl Into<String>, port: u16) -> Self {
        self.params.host = host.into();
        self.params.port = port;
        self
    }

    #[must_use]
    pub const fn interval(mut self, interval: Duration) -> Self {
        self.params.interval = interval;
        self
    }

    #[must_use]
    pub const fn duration(mut self, duration: Duration) -> Self {
        self.params.duration = duration;
        self
    }

    #[must_use]
    pub const fn target_type(mut self, target_type: TargetType) -> Self {
        self.params.target_type = target_type;
        self
    }

    #[must_use]
    pub const fn profile(mut self, profile: ProtocolProfile) -> Self {
        self.params.profile = profile;
        self
    }

    #[must_use]
    pub fn span(mut self, span: Span) -> Self {
        self.params.span = span;
        self
    }

    #[must_use]
    pub const fn reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.params.reconnect = reconnect;
        self
    }

    #[must_use]
    pub const fn jitter(mut self, jitter: JitterBounds) -> Self {
        self.params.jitter = jitter;
        self
    }

    #[must_use]
    pub fn build(self) -> ScenarioParams {
        self.params
    }
}
