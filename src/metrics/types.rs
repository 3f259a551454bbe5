use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::TargetType;

use super::outcome::classify_outcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    Read,
    Write,
    Custom,
    CyclicSend,
    CyclicReceive,
    ConnectionOpen,
    ConnectionClose,
}

impl OperationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            OperationKind::Read => "read",
            OperationKind::Write => "write",
            OperationKind::Custom => "custom",
            OperationKind::CyclicSend => "cyclic_send",
            OperationKind::CyclicReceive => "cyclic_receive",
            OperationKind::ConnectionOpen => "connection_open",
            OperationKind::ConnectionClose => "connection_close",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse result of one operation, independent of the raw status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    Timeout,
    Error,
}

impl Outcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Timeout => "timeout",
            Outcome::Error => "error",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome a probe is designed to provoke. `Any` opts out of
/// misclassification accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedOutcome {
    Success,
    Timeout,
    Error,
    Any,
}

impl ExpectedOutcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ExpectedOutcome::Success => "success",
            ExpectedOutcome::Timeout => "timeout",
            ExpectedOutcome::Error => "error",
            ExpectedOutcome::Any => "any",
        }
    }

    /// True when `outcome` contradicts this expectation.
    #[must_use]
    pub const fn is_misclassified(self, outcome: Outcome) -> bool {
        match self {
            ExpectedOutcome::Any => false,
            ExpectedOutcome::Success => !matches!(outcome, Outcome::Success),
            ExpectedOutcome::Timeout => !matches!(outcome, Outcome::Timeout),
            ExpectedOutcome::Error => !matches!(outcome, Outcome::Error),
        }
    }
}

impl fmt::Display for ExpectedOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpectedOutcome {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "success" => Ok(ExpectedOutcome::Success),
            "timeout" => Ok(ExpectedOutcome::Timeout),
            "error" => Ok(ExpectedOutcome::Error),
            "any" | "" => Ok(ExpectedOutcome::Any),
            other => Err(format!(
                "Invalid expected outcome '{}'. Use success, timeout, error or any.",
                other
            )),
        }
    }
}

/// One observed outcome of a single protocol operation.
///
/// Built with [`Metric::new`] (a success) and narrowed with
/// [`Metric::failed`]; a successful metric therefore always carries status 0
/// and an empty error.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub timestamp: DateTime<Utc>,
    pub scenario: String,
    pub target_type: TargetType,
    pub operation: OperationKind,
    pub target_name: String,
    pub service_code: String,
    pub success: bool,
    pub rtt_ms: f64,
    pub jitter_ms: f64,
    pub status: u8,
    pub error: String,
    pub outcome: Outcome,
    pub expected_outcome: Option<ExpectedOutcome>,
}

impl Metric {
    #[must_use]
    pub fn new(
        scenario: impl Into<String>,
        target_type: TargetType,
        operation: OperationKind,
        target_name: impl Into<String>,
        service_code: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            scenario: scenario.into(),
            target_type,
            operation,
            target_name: target_name.into(),
            service_code: service_code.into(),
            success: true,
            rtt_ms: 0.0,
            jitter_ms: 0.0,
            status: 0,
            error: String::new(),
            outcome: Outcome::Success,
            expected_outcome: None,
        }
    }

    #[must_use]
    pub fn with_rtt(mut self, rtt: Duration) -> Self {
        self.rtt_ms = duration_ms(rtt);
        self
    }

    #[must_use]
    pub fn with_rtt_ms(mut self, rtt_ms: f64) -> Self {
        self.rtt_ms = rtt_ms;
        self
    }

    #[must_use]
    pub fn with_jitter_ms(mut self, jitter_ms: f64) -> Self {
        self.jitter_ms = jitter_ms;
        self
    }

    #[must_use]
    pub fn with_expected(mut self, expected: ExpectedOutcome) -> Self {
        self.expected_outcome = Some(expected);
        self
    }

    /// Marks the operation failed and derives the outcome from the error
    /// text and status.
    #[must_use]
    pub fn failed(mut self, status: u8, error: impl Into<String>) -> Self {
        self.success = false;
        self.status = status;
        self.error = error.into();
        self.outcome = classify_outcome(&self.error, self.status);
        self
    }

    /// Overrides the realized outcome after [`Metric::failed`]; used when a
    /// transport-level success is a finding in its own right.
    #[must_use]
    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = outcome;
        self
    }

    #[must_use]
    pub fn is_misclassified(&self) -> bool {
        self.expected_outcome
            .is_some_and(|expected| expected.is_misclassified(self.outcome))
    }
}

#[must_use]
pub fn duration_ms(duration: Duration) -> f64 {
    let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
    micros as f64 / 1_000.0
}
