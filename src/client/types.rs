use std::time::Duration;

use crate::domain::{CipPath, IoConnectionConfig, IoTransport, ServiceCode};

/// One explicit request as handed to the codec. `embedded` carries the
/// inner requests of a Multiple Service Packet or an Unconnected Send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRequest {
    pub service: ServiceCode,
    pub path: CipPath,
    pub data: Vec<u8>,
    pub embedded: Vec<ServiceRequest>,
}

impl ServiceRequest {
    #[must_use]
    pub const fn new(service: ServiceCode, path: CipPath, data: Vec<u8>) -> Self {
        Self {
            service,
            path,
            data,
            embedded: Vec::new(),
        }
    }

    #[must_use]
    pub const fn get_attribute_single(path: CipPath) -> Self {
        Self::new(ServiceCode::GET_ATTRIBUTE_SINGLE, path, Vec::new())
    }

    /// Batches `requests` into a Multiple Service Packet addressed to the
    /// Message Router.
    #[must_use]
    pub const fn multiple(requests: Vec<ServiceRequest>) -> Self {
        Self {
            service: ServiceCode::MULTIPLE_SERVICE_PACKET,
            path: CipPath::MESSAGE_ROUTER,
            data: Vec::new(),
            embedded: requests,
        }
    }

    /// Wraps `inner` in an Unconnected Send routed to backplane `slot`.
    #[must_use]
    pub fn unconnected_send(inner: ServiceRequest, slot: u8) -> Self {
        Self {
            service: ServiceCode::UNCONNECTED_SEND,
            path: CipPath::CONNECTION_MANAGER,
            data: vec![0x01, slot],
            embedded: vec![inner],
        }
    }

    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.embedded
            .iter()
            .map(ServiceRequest::payload_len)
            .fold(self.data.len(), usize::saturating_add)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceResponse {
    pub service: ServiceCode,
    pub status: u8,
    pub extended_status: Vec<u16>,
    pub data: Vec<u8>,
}

impl ServiceResponse {
    #[must_use]
    pub const fn ok(service: ServiceCode, data: Vec<u8>) -> Self {
        Self {
            service,
            status: 0,
            extended_status: Vec::new(),
            data,
        }
    }

    #[must_use]
    pub const fn status(service: ServiceCode, status: u8) -> Self {
        Self {
            service,
            status,
            extended_status: Vec::new(),
            data: Vec::new(),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoConnectionParams {
    pub name: String,
    pub rpi: Duration,
    pub o_to_t_size: usize,
    pub t_to_o_size: usize,
    pub transport: IoTransport,
    pub connection_point: CipPath,
}

impl From<&IoConnectionConfig> for IoConnectionParams {
    fn from(config: &IoConnectionConfig) -> Self {
        Self {
            name: config.name.clone(),
            rpi: config.rpi,
            o_to_t_size: config.o_to_t_size,
            t_to_o_size: config.t_to_o_size,
            transport: config.transport,
            connection_point: config.connection_point,
        }
    }
}

/// Handle for an open cyclic connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoConnection {
    pub o_to_t_id: u32,
    pub t_to_o_id: u32,
    pub serial: u16,
    pub params: IoConnectionParams,
}

/// Encapsulation bytes sent outside the codec. `segments` are written one
/// after another with `inter_segment_delay` between them so a middlebox sees
/// them as separate TCP segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub segments: Vec<Vec<u8>>,
    pub inter_segment_delay: Duration,
    pub expect_reply: bool,
}

impl RawFrame {
    #[must_use]
    pub fn whole(bytes: Vec<u8>) -> Self {
        Self {
            segments: vec![bytes],
            inter_segment_delay: Duration::ZERO,
            expect_reply: true,
        }
    }

    #[must_use]
    pub fn total_len(&self) -> usize {
        self.segments
            .iter()
            .map(Vec::len)
            .fold(0, usize::saturating_add)
    }

    #[must_use]
    pub fn concat(&self) -> Vec<u8> {
        self.segments.concat()
    }
}
