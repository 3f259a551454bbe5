//! Evasion scenarios. These are the only scenarios that put hand-built
//! encapsulation bytes on the wire (via [`Client::send_raw`]); everything
//! else goes through the codec.
mod techniques;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{Instrument, debug, info};

use crate::client::encap::{self, EncapCommand, EncapHeader};
use crate::client::{Client, RawFrame};
use crate::domain::{CipPath, TargetConfig};
use crate::error::{ClientError, ScenarioError};
use crate::metrics::OperationKind;
use crate::shutdown::ShutdownSignal;

use super::context::{OpSpec, RunContext, release};
use super::reconnect::{Link, connect_initial, ensure_connected};
use super::timing::Pacer;
use super::{Scenario, ScenarioParams};

pub(crate) use techniques::Family;
use techniques::Technique;

/// Status byte for a reply whose encapsulation status does not fit in one.
const WIDE_STATUS: u8 = 0xFF;

fn command_label(command: u16) -> String {
    format!("0x{:04X}", command)
}

/// Collapses a raw reply into the status shape metrics record: `Ok(0)` for
/// a success or an intentionally empty reply, `Ok(status)` for an
/// encapsulation error.
fn reply_status(reply: &[u8]) -> Result<u8, ClientError> {
    if reply.is_empty() {
        return Ok(0);
    }
    let header = EncapHeader::parse(reply).ok_or_else(|| ClientError::Transport {
        message: format!("malformed reply ({} bytes)", reply.len()),
    })?;
    if header.status == encap::STATUS_SUCCESS {
        return Ok(0);
    }
    Ok(u8::try_from(header.status).unwrap_or(WIDE_STATUS))
}

/// One evasion family, cycling its techniques round-robin, one per interval.
#[derive(Debug)]
pub(crate) struct EvasionScenario {
    family: Family,
}

impl EvasionScenario {
    pub(crate) const fn new(family: Family) -> Self {
        Self { family }
    }
}

#[async_trait]
impl Scenario for EvasionScenario {
    fn name(&self) -> &'static str {
        self.family.scenario_name()
    }

    fn description(&self) -> &'static str {
        self.family.description()
    }

    async fn run(
        &self,
        shutdown: ShutdownSignal,
        client: &mut dyn Client,
        targets: &TargetConfig,
        params: &ScenarioParams,
    ) -> Result<(), ScenarioError> {
        let path = targets
            .reads_or_identity()
            .first()
            .map_or(CipPath::IDENTITY.with_attribute(1), |target| target.path);
        let mut evasion = Evasion {
            family: self.family,
            path,
            label: self.name(),
            session: None,
            sent: 0,
        };
        let mut ctx = RunContext::new(params, shutdown);
        let result = evasion
            .run(&mut ctx, client)
            .instrument(params.span.clone())
            .await;
        release(client).await;
        result
    }
}

/// How a raw session registration ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Registration {
    Accepted(u32),
    Refused,
    Cancelled,
}

/// Per-run evasion state: the raw session handle survives across cycles and
/// is dropped whenever a technique or a reconnect invalidates it.
struct Evasion<'run> {
    family: Family,
    path: CipPath,
    label: &'run str,
    session: Option<u32>,
    sent: u64,
}

impl Evasion<'_> {
    async fn run(
        &mut self,
        ctx: &mut RunContext<'_>,
        client: &mut dyn Client,
    ) -> Result<(), ScenarioError> {
        if connect_initial(ctx, client).await? == Link::Cancelled {
            return Ok(());
        }
        let techniques = self.family.techniques();
        info!(
            "{}: cycling {} techniques against {}",
            self.label,
            techniques.len(),
            self.path
        );

        let mut pacer = Pacer::new(ctx.params().interval);
        for technique in techniques.iter().copied().cycle() {
            if ctx.should_stop() {
                break;
            }
            let jitter = pacer.begin();
            if !client.is_connected() {
                self.session = None;
                if !ensure_connected(ctx, client).await?.is_up() {
                    break;
                }
            }
            let handle = match self.session {
                Some(handle) => handle,
                None => match self.register(ctx, client).await {
                    Registration::Accepted(handle) => {
                        self.session = Some(handle);
                        handle
                    }
                    // Fire with a null handle; the next cycle registers again.
                    Registration::Refused => 0,
                    Registration::Cancelled => break,
                },
            };
            if !self.fire(ctx, client, technique, handle, jitter).await {
                break;
            }
            let wake = pacer.advance();
            if !ctx.pace_until(wake).await {
                break;
            }
        }
        info!("{}: {} evasion frames sent", self.label, self.sent);
        Ok(())
    }

    /// Registers a session through raw bytes so later frames can carry a
    /// valid handle. An empty reply is accepted with a null handle.
    async fn register(&self, ctx: &mut RunContext<'_>, client: &mut dyn Client) -> Registration {
        let frame = RawFrame::whole(encap::register_session());
        let spec = OpSpec::new(self.label, OperationKind::ConnectionOpen, "session")
            .service_label(command_label(EncapCommand::RegisterSession.code()));
        let Some((reply, rtt)) = ctx.timed(client.send_raw(&frame)).await else {
            return Registration::Cancelled;
        };
        let status = match &reply {
            Ok(bytes) => reply_status(bytes),
            Err(err) => Err(err.clone()),
        };
        ctx.record_status(&spec, status.as_ref().copied(), rtt);
        match (&reply, status) {
            (Ok(bytes), Ok(0)) => {
                let session = EncapHeader::parse(bytes).map_or(0, |header| header.session);
                debug!("{}: registered raw session 0x{:08X}", self.label, session);
                Registration::Accepted(session)
            }
            (_, Ok(code)) => {
                debug!("{}: session registration refused with 0x{:02X}", self.label, code);
                Registration::Refused
            }
            (_, Err(err)) => {
                debug!("{}: session registration failed: {}", self.label, err);
                Registration::Refused
            }
        }
    }

    /// Sends one technique's frame and records it. Returns `false` when
    /// cancelled.
    async fn fire(
        &mut self,
        ctx: &mut RunContext<'_>,
        client: &mut dyn Client,
        technique: Technique,
        handle: u32,
        jitter: Duration,
    ) -> bool {
        let frame = technique.frame(handle, self.path);
        let spec = OpSpec::new(self.label, OperationKind::Custom, technique.name())
            .service_label(command_label(technique.command()))
            .expected(technique.expected())
            .jitter(jitter);
        debug!(
            "{}: {} ({} bytes in {} segments)",
            self.label,
            technique.name(),
            frame.total_len(),
            frame.segments.len()
        );
        let Some((reply, rtt)) = ctx.timed(client.send_raw(&frame)).await else {
            return false;
        };
        let status = match &reply {
            Ok(bytes) => reply_status(bytes),
            Err(err) => Err(err.clone()),
        };
        ctx.record_status(&spec, status.as_ref().copied(), rtt);
        self.sent = self.sent.saturating_add(1);

        if technique.registers_session()
            && let (Ok(bytes), Ok(0)) = (&reply, &status)
            && let Some(header) = EncapHeader::parse(bytes)
        {
            self.session = Some(header.session);
        }
        if technique.ends_session() {
            self.session = None;
        }
        true
    }
}
