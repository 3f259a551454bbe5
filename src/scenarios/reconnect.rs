use std::time::Duration;

use tokio::time::{Instant, timeout_at};
use tracing::{info, warn};

use crate::client::Client;
use crate::error::{ClientError, ScenarioError};

use super::context::RunContext;
use super::timing::instant_after;

pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 3;
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Bounded reconnection with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl ReconnectPolicy {
    #[must_use]
    pub const fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY)
    }
}

/// What a connection check ended with when it did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Link {
    Up,
    Cancelled,
    /// The run deadline passed while the link was being restored.
    Expired,
}

impl Link {
    pub(crate) const fn is_up(self) -> bool {
        matches!(self, Self::Up)
    }
}

/// Single connection attempt at scenario start. Failure is fatal.
pub(crate) async fn connect_initial(
    ctx: &mut RunContext<'_>,
    client: &mut dyn Client,
) -> Result<Link, ScenarioError> {
    let host = ctx.params().host.clone();
    let port = ctx.params().port;
    match ctx.attempt(client.connect(&host, port)).await {
        None => Ok(Link::Cancelled),
        Some(Ok(())) => {
            info!("Connected to {}:{}", host, port);
            Ok(Link::Up)
        }
        Some(Err(source)) => Err(ScenarioError::InitialConnect { host, port, source }),
    }
}

/// Restores a dropped connection, trying up to `policy.attempts` times with
/// `policy.delay` between attempts. Accumulated scenario state is untouched.
///
/// Neither the backoff nor a connect in flight outlives the run deadline;
/// reaching it yields [`Link::Expired`] rather than an error.
pub(crate) async fn ensure_connected(
    ctx: &mut RunContext<'_>,
    client: &mut dyn Client,
) -> Result<Link, ScenarioError> {
    if client.is_connected() {
        return Ok(Link::Up);
    }
    let policy = ctx.params().reconnect;
    let host = ctx.params().host.clone();
    let port = ctx.params().port;
    let attempts = policy.attempts.max(1);
    let deadline = ctx.deadline();
    let mut last_error = None;

    for attempt in 1..=attempts {
        if attempt > 1 && !ctx.pace_until(instant_after(Instant::now(), policy.delay)).await {
            return Ok(Link::Cancelled);
        }
        if ctx.expired() {
            info!(
                "Run deadline reached before reconnect attempt {}/{} to {}:{}",
                attempt, attempts, host, port
            );
            return Ok(Link::Expired);
        }
        match timeout_at(deadline, ctx.attempt(client.connect(&host, port))).await {
            Err(_elapsed) => {
                info!("Run deadline reached during reconnect to {}:{}", host, port);
                return Ok(Link::Expired);
            }
            Ok(None) => return Ok(Link::Cancelled),
            Ok(Some(Ok(()))) => {
                info!(
                    "Reconnected to {}:{} on attempt {}/{}",
                    host, port, attempt, attempts
                );
                return Ok(Link::Up);
            }
            Ok(Some(Err(err))) => {
                warn!(
                    "Reconnect attempt {}/{} to {}:{} failed: {}",
                    attempt, attempts, host, port, err
                );
                last_error = Some(err);
            }
        }
    }

    Err(ScenarioError::ReconnectExhausted {
        attempts,
        source: last_error.unwrap_or(ClientError::NotConnected),
    })
}
