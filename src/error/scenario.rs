use thiserror::Error;

use super::ClientError;

/// Run-aborting scenario failures. Per-operation failures never surface
/// here; they are recorded as metrics instead.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Initial connection to {host}:{port} failed: {source}")]
    InitialConnect {
        host: String,
        port: u16,
        #[source]
        source: ClientError,
    },
    #[error("Reconnection failed after {attempts} attempts: {source}")]
    ReconnectExhausted {
        attempts: u32,
        #[source]
        source: ClientError,
    },
    #[error("Scenario '{scenario}' requires cyclic I/O configuration, none was provided.")]
    MissingIoConfig { scenario: &'static str },
    #[error("Scenario '{scenario}' requires at least one {kind} target.")]
    NoTargets {
        scenario: &'static str,
        kind: &'static str,
    },
    #[error("Scenario '{scenario}' found no edge targets tagged '{tag}'.")]
    NoTaggedTargets { scenario: &'static str, tag: String },
    #[error("All {count} cyclic connections failed to open; last error: {source}")]
    AllConnectionsFailed {
        count: usize,
        #[source]
        source: ClientError,
    },
    #[error("Client failure: {0}")]
    Client(#[from] ClientError),
    #[error("Unknown scenario '{name}'. Available: {available}")]
    UnknownScenario { name: String, available: String },
    #[cfg(test)]
    #[error("Test expectation failed: {message}")]
    TestExpectation { message: &'static str },
    #[cfg(test)]
    #[error("Test expectation failed: {message}: {value}")]
    TestExpectationValue {
        message: &'static str,
        value: String,
    },
}
