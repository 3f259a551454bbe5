//! Raw encapsulation frames for each evasion technique.
//!
//! Every frame wraps the same payload, a `Get_Attribute_Single` on the
//! run's first read target carried in `SendRRData`, and differs only in how
//! it is cut, timed or corrupted on the wire.
use std::time::Duration;

use crate::client::RawFrame;
use crate::client::encap::{self, EncapCommand, EncapHeader, HEADER_LEN, PROTOCOL_VERSION};
use crate::domain::{CipPath, ServiceCode};
use crate::metrics::ExpectedOutcome;

/// Offset of the CIP request inside a `SendRRData` frame: header plus the
/// 16-byte common packet format prefix.
const CIP_OFFSET: usize = 40;
const UNKNOWN_COMMAND: u16 = 0x00FF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Family {
    Segment,
    Fuzz,
    Anomaly,
    Timing,
}

impl Family {
    pub(crate) const fn scenario_name(self) -> &'static str {
        match self {
            Family::Segment => "evasion_segment",
            Family::Fuzz => "evasion_fuzz",
            Family::Anomaly => "evasion_anomaly",
            Family::Timing => "evasion_timing",
        }
    }

    pub(crate) const fn description(self) -> &'static str {
        match self {
            Family::Segment => "Valid requests split across TCP segments at awkward offsets",
            Family::Fuzz => "Session-state fuzzing: stale, missing and re-registered sessions",
            Family::Anomaly => "Malformed encapsulation: lying lengths, unknown commands, bad options",
            Family::Timing => "Valid requests delivered with stalls between segments",
        }
    }

    pub(crate) const fn techniques(self) -> &'static [Technique] {
        match self {
            Family::Segment => &[
                Technique::SplitHeader,
                Technique::SplitBeforeCip,
                Technique::TinySegments,
            ],
            Family::Fuzz => &[
                Technique::SendWithoutSession,
                Technique::StaleSession,
                Technique::DoubleRegister,
                Technique::UnregisterMidStream,
            ],
            Family::Anomaly => &[
                Technique::LengthMismatch,
                Technique::UnknownCommand,
                Technique::NonZeroOptions,
                Technique::UnsupportedVersion,
            ],
            Family::Timing => &[
                Technique::SlowDrip,
                Technique::DelayedTail,
                Technique::NopKeepalive,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Technique {
    SplitHeader,
    SplitBeforeCip,
    TinySegments,
    SendWithoutSession,
    StaleSession,
    DoubleRegister,
    UnregisterMidStream,
    LengthMismatch,
    UnknownCommand,
    NonZeroOptions,
    UnsupportedVersion,
    SlowDrip,
    DelayedTail,
    NopKeepalive,
}

impl Technique {
    pub(crate) const fn name(self) -> &'static str {
        match self {
            Technique::SplitHeader => "split_header",
            Technique::SplitBeforeCip => "split_before_cip",
            Technique::TinySegments => "tiny_segments",
            Technique::SendWithoutSession => "send_without_session",
            Technique::StaleSession => "stale_session",
            Technique::DoubleRegister => "double_register",
            Technique::UnregisterMidStream => "unregister_mid_stream",
            Technique::LengthMismatch => "length_mismatch",
            Technique::UnknownCommand => "unknown_command",
            Technique::NonZeroOptions => "nonzero_options",
            Technique::UnsupportedVersion => "unsupported_version",
            Technique::SlowDrip => "slow_drip",
            Technique::DelayedTail => "delayed_tail",
            Technique::NopKeepalive => "nop_keepalive",
        }
    }

    /// Encapsulation command on the wire, used as the metric's service code.
    pub(crate) const fn command(self) -> u16 {
        match self {
            Technique::DoubleRegister | Technique::UnsupportedVersion => {
                EncapCommand::RegisterSession.code()
            }
            Technique::UnregisterMidStream => EncapCommand::UnregisterSession.code(),
            Technique::NopKeepalive => EncapCommand::Nop.code(),
            Technique::UnknownCommand => UNKNOWN_COMMAND,
            Technique::SplitHeader
            | Technique::SplitBeforeCip
            | Technique::TinySegments
            | Technique::SendWithoutSession
            | Technique::StaleSession
            | Technique::LengthMismatch
            | Technique::NonZeroOptions
            | Technique::SlowDrip
            | Technique::DelayedTail => EncapCommand::SendRrData.code(),
        }
    }

    /// What a conforming target answers.
    pub(crate) const fn expected(self) -> ExpectedOutcome {
        match self {
            Technique::SplitHeader
            | Technique::SplitBeforeCip
            | Technique::TinySegments
            | Technique::DoubleRegister
            | Technique::UnregisterMidStream
            | Technique::SlowDrip
            | Technique::DelayedTail
            | Technique::NopKeepalive => ExpectedOutcome::Success,
            Technique::SendWithoutSession
            | Technique::StaleSession
            | Technique::LengthMismatch
            | Technique::UnknownCommand
            | Technique::UnsupportedVersion => ExpectedOutcome::Error,
            Technique::NonZeroOptions => ExpectedOutcome::Timeout,
        }
    }

    /// Whether the reply carries a fresh session handle to adopt.
    pub(crate) const fn registers_session(self) -> bool {
        matches!(self, Technique::DoubleRegister)
    }

    /// Whether the target tears the session down after this frame.
    pub(crate) const fn ends_session(self) -> bool {
        matches!(
            self,
            Technique::UnregisterMidStream | Technique::LengthMismatch
        )
    }

    pub(crate) fn frame(self, session: u32, path: CipPath) -> RawFrame {
        let request = valid_request(session, path);
        match self {
            Technique::SplitHeader => segmented(split_at(&request, &[12]), 10),
            Technique::SplitBeforeCip => segmented(split_at(&request, &[CIP_OFFSET]), 10),
            Technique::TinySegments => segmented(chunks(&request, 2), 1),
            Technique::SendWithoutSession => RawFrame::whole(valid_request(0, path)),
            Technique::StaleSession => {
                RawFrame::whole(valid_request(session.wrapping_add(1).max(1), path))
            }
            Technique::DoubleRegister => RawFrame::whole(encap::register_session()),
            Technique::UnregisterMidStream => RawFrame {
                expect_reply: false,
                ..RawFrame::whole(encap::unregister_session(session))
            },
            Technique::LengthMismatch => RawFrame::whole(rewrite_header(&request, |header| {
                header.length = header.length.saturating_add(8);
            })),
            Technique::UnknownCommand => {
                RawFrame::whole(EncapHeader::new(UNKNOWN_COMMAND, 0, session).encode())
            }
            Technique::NonZeroOptions => RawFrame::whole(rewrite_header(&request, |header| {
                header.options = 1;
            })),
            Technique::UnsupportedVersion => {
                let mut payload = Vec::with_capacity(4);
                payload.extend_from_slice(&PROTOCOL_VERSION.saturating_add(1).to_le_bytes());
                payload.extend_from_slice(&0_u16.to_le_bytes());
                RawFrame::whole(encap::frame(EncapCommand::RegisterSession, 0, &payload))
            }
            Technique::SlowDrip => segmented(chunks(&request, 8), 25),
            Technique::DelayedTail => segmented(split_at(&request, &[HEADER_LEN]), 250),
            Technique::NopKeepalive => RawFrame {
                expect_reply: false,
                ..RawFrame::whole(encap::frame(EncapCommand::Nop, session, &[0; 8]))
            },
        }
    }
}

fn valid_request(session: u32, path: CipPath) -> Vec<u8> {
    let cip = encap::cip_request(ServiceCode::GET_ATTRIBUTE_SINGLE, &path, &[]);
    encap::send_rr_data(session, &cip)
}

fn segmented(segments: Vec<Vec<u8>>, delay_ms: u64) -> RawFrame {
    RawFrame {
        segments,
        inter_segment_delay: Duration::from_millis(delay_ms),
        expect_reply: true,
    }
}

/// Cuts `bytes` at every offset in `cuts` (ascending, out-of-range ignored).
fn split_at(bytes: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut segments = Vec::with_capacity(cuts.len().saturating_add(1));
    let mut rest = bytes;
    let mut consumed = 0_usize;
    for cut in cuts {
        let Some(len) = cut.checked_sub(consumed) else {
            continue;
        };
        if len == 0 || len >= rest.len() {
            continue;
        }
        let (head, tail) = rest.split_at(len);
        segments.push(head.to_vec());
        rest = tail;
        consumed = *cut;
    }
    segments.push(rest.to_vec());
    segments
}

fn chunks(bytes: &[u8], size: usize) -> Vec<Vec<u8>> {
    bytes.chunks(size.max(1)).map(<[u8]>::to_vec).collect()
}

fn rewrite_header(bytes: &[u8], edit: impl FnOnce(&mut EncapHeader)) -> Vec<u8> {
    let Some(mut header) = EncapHeader::parse(bytes) else {
        return bytes.to_vec();
    };
    edit(&mut header);
    let mut out = header.encode();
    out.extend_from_slice(bytes.get(HEADER_LEN..).unwrap_or(&[]));
    out
}
