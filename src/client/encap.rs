//! Minimal EtherNet/IP encapsulation framing.
//!
//! Only what raw-frame probes and the emulated adapter need: the 24-byte
//! header, session registration and an unconnected `SendRRData` carrying a
//! `Get_Attribute_Single`. All fields are little-endian on the wire.
use crate::domain::{CipPath, ServiceCode};

pub const HEADER_LEN: usize = 24;
pub const CPF_NULL_ADDRESS: u16 = 0x0000;
pub const CPF_UNCONNECTED_DATA: u16 = 0x00B2;
pub const PROTOCOL_VERSION: u16 = 1;

pub const STATUS_SUCCESS: u32 = 0x0000;
pub const STATUS_INVALID_COMMAND: u32 = 0x0001;
pub const STATUS_INVALID_LENGTH: u32 = 0x0065;
pub const STATUS_INVALID_SESSION: u32 = 0x0064;
pub const STATUS_UNSUPPORTED_REVISION: u32 = 0x0069;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncapCommand {
    Nop,
    ListServices,
    ListIdentity,
    ListInterfaces,
    RegisterSession,
    UnregisterSession,
    SendRrData,
    SendUnitData,
}

impl EncapCommand {
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            EncapCommand::Nop => 0x0000,
            EncapCommand::ListServices => 0x0004,
            EncapCommand::ListIdentity => 0x0063,
            EncapCommand::ListInterfaces => 0x0064,
            EncapCommand::RegisterSession => 0x0065,
            EncapCommand::UnregisterSession => 0x0066,
            EncapCommand::SendRrData => 0x006F,
            EncapCommand::SendUnitData => 0x0070,
        }
    }

    #[must_use]
    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            0x0000 => Some(EncapCommand::Nop),
            0x0004 => Some(EncapCommand::ListServices),
            0x0063 => Some(EncapCommand::ListIdentity),
            0x0064 => Some(EncapCommand::ListInterfaces),
            0x0065 => Some(EncapCommand::RegisterSession),
            0x0066 => Some(EncapCommand::UnregisterSession),
            0x006F => Some(EncapCommand::SendRrData),
            0x0070 => Some(EncapCommand::SendUnitData),
            _ => None,
        }
    }

    /// Commands that are only valid inside a registered session.
    #[must_use]
    pub const fn needs_session(self) -> bool {
        matches!(
            self,
            EncapCommand::SendRrData | EncapCommand::SendUnitData | EncapCommand::UnregisterSession
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncapHeader {
    pub command: u16,
    pub length: u16,
    pub session: u32,
    pub status: u32,
    pub context: [u8; 8],
    pub options: u32,
}

impl EncapHeader {
    #[must_use]
    pub const fn new(command: u16, length: u16, session: u32) -> Self {
        Self {
            command,
            length,
            session,
            status: STATUS_SUCCESS,
            context: [0; 8],
            options: 0,
        }
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN);
        out.extend_from_slice(&self.command.to_le_bytes());
        out.extend_from_slice(&self.length.to_le_bytes());
        out.extend_from_slice(&self.session.to_le_bytes());
        out.extend_from_slice(&self.status.to_le_bytes());
        out.extend_from_slice(&self.context);
        out.extend_from_slice(&self.options.to_le_bytes());
        out
    }

    /// Parses the first 24 bytes of `bytes`. Returns `None` when fewer are
    /// available.
    #[must_use]
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        Some(Self {
            command: u16::from_le_bytes(bytes.get(0..2)?.try_into().ok()?),
            length: u16::from_le_bytes(bytes.get(2..4)?.try_into().ok()?),
            session: u32::from_le_bytes(bytes.get(4..8)?.try_into().ok()?),
            status: u32::from_le_bytes(bytes.get(8..12)?.try_into().ok()?),
            context: bytes.get(12..20)?.try_into().ok()?,
            options: u32::from_le_bytes(bytes.get(20..24)?.try_into().ok()?),
        })
    }
}

/// Header plus payload with a correct length field.
#[must_use]
pub fn frame(command: EncapCommand, session: u32, payload: &[u8]) -> Vec<u8> {
    let length = u16::try_from(payload.len()).unwrap_or(u16::MAX);
    let mut out = EncapHeader::new(command.code(), length, session).encode();
    out.extend_from_slice(payload);
    out
}

#[must_use]
pub fn register_session() -> Vec<u8> {
    let mut payload = Vec::with_capacity(4);
    payload.extend_from_slice(&PROTOCOL_VERSION.to_le_bytes());
    payload.extend_from_slice(&0_u16.to_le_bytes());
    frame(EncapCommand::RegisterSession, 0, &payload)
}

#[must_use]
pub fn unregister_session(session: u32) -> Vec<u8> {
    frame(EncapCommand::UnregisterSession, session, &[])
}

#[must_use]
pub fn list_identity() -> Vec<u8> {
    frame(EncapCommand::ListIdentity, 0, &[])
}

/// Common Packet Format body for an unconnected explicit request.
#[must_use]
pub fn send_rr_data_payload(cip: &[u8]) -> Vec<u8> {
    let cip_len = u16::try_from(cip.len()).unwrap_or(u16::MAX);
    let mut payload = Vec::with_capacity(cip.len().saturating_add(16));
    payload.extend_from_slice(&0_u32.to_le_bytes());
    payload.extend_from_slice(&10_u16.to_le_bytes());
    payload.extend_from_slice(&2_u16.to_le_bytes());
    payload.extend_from_slice(&CPF_NULL_ADDRESS.to_le_bytes());
    payload.extend_from_slice(&0_u16.to_le_bytes());
    payload.extend_from_slice(&CPF_UNCONNECTED_DATA.to_le_bytes());
    payload.extend_from_slice(&cip_len.to_le_bytes());
    payload.extend_from_slice(cip);
    payload
}

#[must_use]
pub fn send_rr_data(session: u32, cip: &[u8]) -> Vec<u8> {
    frame(EncapCommand::SendRrData, session, &send_rr_data_payload(cip))
}

/// Logical-segment path for `path`, padded to whole words.
#[must_use]
pub fn logical_path(path: &CipPath) -> Vec<u8> {
    let mut out = Vec::with_capacity(8);
    push_segment(&mut out, 0x20, path.class);
    push_segment(&mut out, 0x24, path.instance);
    if let Some(attribute) = path.attribute {
        push_segment(&mut out, 0x30, attribute);
    }
    out
}

fn push_segment(out: &mut Vec<u8>, segment: u8, value: u16) {
    match u8::try_from(value) {
        Ok(short) => {
            out.push(segment);
            out.push(short);
        }
        Err(_) => {
            out.push(segment | 0x01);
            out.push(0);
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
}

/// Message Router request: service, path size in words, path, data.
#[must_use]
pub fn cip_request(service: ServiceCode, path: &CipPath, data: &[u8]) -> Vec<u8> {
    let epath = logical_path(path);
    let words = u8::try_from(epath.len().checked_div(2).unwrap_or(0)).unwrap_or(u8::MAX);
    let mut out = Vec::with_capacity(epath.len().saturating_add(data.len()).saturating_add(2));
    out.push(service.0);
    out.push(words);
    out.extend_from_slice(&epath);
    out.extend_from_slice(data);
    out
}
