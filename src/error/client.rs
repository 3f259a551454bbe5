use thiserror::Error;

/// Failures surfaced by a [`crate::client::Client`].
///
/// The rendered messages are part of the contract: the metrics aggregator
/// classifies failures by looking for `timeout` and `connection` in the
/// error text, so timeout variants mention the former and connection-level
/// variants the latter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("connection failed: {message}")]
    ConnectFailed { message: String },
    #[error("i/o timeout after {after_ms}ms")]
    Timeout { after_ms: u64 },
    #[error("connection reset by peer")]
    ConnectionReset,
    #[error("not connected: no active connection")]
    NotConnected,
    #[error("transport error: {message}")]
    Transport { message: String },
    #[error("operation not supported by client: {operation}")]
    Unsupported { operation: &'static str },
}

impl ClientError {
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout { .. })
    }

    #[must_use]
    pub const fn is_reset(&self) -> bool {
        matches!(
            self,
            ClientError::ConnectionReset | ClientError::NotConnected
        )
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
