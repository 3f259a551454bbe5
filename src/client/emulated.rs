use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::sleep;

use crate::domain::{CipPath, IoTransport, ServiceCode};
use crate::error::{ClientError, ClientResult};

use super::encap::{self, EncapCommand, EncapHeader, HEADER_LEN};
use super::{Client, IoConnection, IoConnectionParams, RawFrame, ServiceRequest, ServiceResponse};

/// CIP general status codes the emulator answers with.
const STATUS_CONNECTION_FAILURE: u8 = 0x01;
const STATUS_PATH_SEGMENT_ERROR: u8 = 0x04;
const STATUS_PATH_UNKNOWN: u8 = 0x05;
const STATUS_SERVICE_NOT_SUPPORTED: u8 = 0x08;
const STATUS_ATTRIBUTE_NOT_SETTABLE: u8 = 0x0E;
const STATUS_NOT_ENOUGH_DATA: u8 = 0x13;
const STATUS_ATTRIBUTE_NOT_SUPPORTED: u8 = 0x14;
const STATUS_TOO_MUCH_DATA: u8 = 0x15;
const STATUS_OBJECT_DOES_NOT_EXIST: u8 = 0x16;
const STATUS_EMBEDDED_SERVICE_ERROR: u8 = 0x1E;

const CLASS_IDENTITY: u16 = 0x01;
const CLASS_ASSEMBLY: u16 = 0x04;
const KNOWN_CLASSES: [u16; 7] = [CLASS_IDENTITY, 0x02, CLASS_ASSEMBLY, 0x06, 0xF4, 0xF5, 0xF6];
const MAX_ASSEMBLY_INSTANCE: u16 = 0x04FF;
const MAX_OBJECT_INSTANCE: u16 = 0x10;
const MAX_ATTRIBUTE: u16 = 0x40;
const MAX_BACKPLANE_SLOT: u8 = 16;
const MAX_CLASS1_SIZE: usize = 511;

#[derive(Debug, Clone)]
pub struct EmulatorSettings {
    pub latency: Duration,
    pub latency_jitter: Duration,
    /// Probability in `[0, 1]` that any single exchange times out.
    pub failure_rate: f64,
    pub response_timeout: Duration,
    pub max_payload: usize,
    pub seed: Option<u64>,
}

impl Default for EmulatorSettings {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(2),
            latency_jitter: Duration::from_millis(1),
            failure_rate: 0.0,
            response_timeout: Duration::from_secs(1),
            max_payload: 504,
            seed: None,
        }
    }
}

/// In-process emulated EtherNet/IP adapter.
///
/// Answers explicit requests from an attribute store, enforces the usual
/// object-model errors, echoes cyclic data and reacts to raw encapsulation
/// frames the way a conforming adapter would (error replies for unknown
/// commands or sessions, a reset on a lying length field).
#[derive(Debug)]
pub struct EmulatedClient {
    settings: EmulatorSettings,
    rng: StdRng,
    connected: bool,
    session: Option<u32>,
    store: HashMap<CipPath, Vec<u8>>,
    connections: HashMap<u32, Vec<u8>>,
    next_connection_id: u32,
    next_serial: u16,
}

impl EmulatedClient {
    #[must_use]
    pub fn new(settings: EmulatorSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            settings,
            rng,
            connected: false,
            session: None,
            store: HashMap::new(),
            connections: HashMap::new(),
            next_connection_id: 0x1000,
            next_serial: 1,
        }
    }

    #[must_use]
    pub fn open_connections(&self) -> usize {
        self.connections.len()
    }

    /// Changes the injected failure probability for subsequent exchanges.
    pub fn set_failure_rate(&mut self, rate: f64) {
        self.settings.failure_rate = rate;
    }

    fn response_latency(&mut self) -> Duration {
        let jitter_us = u64::try_from(self.settings.latency_jitter.as_micros()).unwrap_or(0);
        let extra = if jitter_us == 0 {
            0
        } else {
            self.rng.gen_range(0..=jitter_us)
        };
        self.settings
            .latency
            .saturating_add(Duration::from_micros(extra))
    }

    fn roll_failure(&mut self) -> bool {
        let rate = self.settings.failure_rate.clamp(0.0, 1.0);
        rate > 0.0 && self.rng.gen_bool(rate)
    }

    async fn timeout(&self) -> ClientError {
        sleep(self.settings.response_timeout).await;
        ClientError::Timeout {
            after_ms: u64::try_from(self.settings.response_timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// One request/response turn: connection check, injected failure, latency.
    async fn exchange(&mut self) -> ClientResult<()> {
        if !self.connected {
            return Err(ClientError::NotConnected);
        }
        if self.roll_failure() {
            return Err(self.timeout().await);
        }
        let latency = self.response_latency();
        sleep(latency).await;
        Ok(())
    }

    fn respond(&mut self, request: &ServiceRequest) -> ServiceResponse {
        let service = request.service;
        if request.payload_len() > self.settings.max_payload {
            return ServiceResponse::status(service, STATUS_TOO_MUCH_DATA);
        }
        match service {
            ServiceCode::MULTIPLE_SERVICE_PACKET => self.respond_batch(request),
            ServiceCode::UNCONNECTED_SEND => self.respond_routed(request),
            ServiceCode::GET_ATTRIBUTES_ALL
            | ServiceCode::GET_ATTRIBUTE_LIST
            | ServiceCode::GET_ATTRIBUTE_SINGLE
            | ServiceCode::SET_ATTRIBUTE_SINGLE => self.respond_attribute(request),
            ServiceCode(_) => ServiceResponse::status(service, STATUS_SERVICE_NOT_SUPPORTED),
        }
    }

    fn respond_batch(&mut self, request: &ServiceRequest) -> ServiceResponse {
        let service = request.service;
        if request.path != CipPath::MESSAGE_ROUTER {
            return ServiceResponse::status(service, STATUS_PATH_UNKNOWN);
        }
        if request.embedded.is_empty() {
            return ServiceResponse::status(service, STATUS_NOT_ENOUGH_DATA);
        }
        let replies: Vec<ServiceResponse> = request
            .embedded
            .iter()
            .map(|inner| self.respond(inner))
            .collect();
        let count = u8::try_from(replies.len()).unwrap_or(u8::MAX);
        let mut data = vec![count];
        data.extend(replies.iter().map(|reply| reply.status));
        if replies.iter().all(ServiceResponse::is_success) {
            ServiceResponse::ok(service, data)
        } else {
            ServiceResponse {
                service,
                status: STATUS_EMBEDDED_SERVICE_ERROR,
                extended_status: Vec::new(),
                data,
            }
        }
    }

    fn respond_routed(&mut self, request: &ServiceRequest) -> ServiceResponse {
        let service = request.service;
        if request.path != CipPath::CONNECTION_MANAGER {
            return ServiceResponse::status(service, STATUS_PATH_UNKNOWN);
        }
        let slot = request.data.get(1).copied().unwrap_or(0);
        if slot > MAX_BACKPLANE_SLOT {
            return ServiceResponse {
                service,
                status: STATUS_CONNECTION_FAILURE,
                extended_status: vec![0x0311],
                data: Vec::new(),
            };
        }
        match request.embedded.first() {
            Some(inner) => self.respond(inner),
            None => ServiceResponse::status(service, STATUS_NOT_ENOUGH_DATA),
        }
    }

    fn respond_attribute(&mut self, request: &ServiceRequest) -> ServiceResponse {
        let service = request.service;
        let path = request.path;
        if !KNOWN_CLASSES.contains(&path.class) {
            return ServiceResponse::status(service, STATUS_PATH_UNKNOWN);
        }
        let max_instance = if path.class == CLASS_ASSEMBLY {
            MAX_ASSEMBLY_INSTANCE
        } else {
            MAX_OBJECT_INSTANCE
        };
        if path.instance > max_instance {
            return ServiceResponse::status(service, STATUS_OBJECT_DOES_NOT_EXIST);
        }
        if let Some(attribute) = path.attribute
            && (attribute == 0 || attribute > MAX_ATTRIBUTE)
        {
            return ServiceResponse::status(service, STATUS_ATTRIBUTE_NOT_SUPPORTED);
        }

        match service {
            ServiceCode::GET_ATTRIBUTE_SINGLE => {
                if path.attribute.is_none() {
                    return ServiceResponse::status(service, STATUS_PATH_SEGMENT_ERROR);
                }
                let value = self
                    .store
                    .get(&path)
                    .cloned()
                    .unwrap_or_else(|| default_value(&path));
                ServiceResponse::ok(service, value)
            }
            ServiceCode::SET_ATTRIBUTE_SINGLE => {
                if path.attribute.is_none() {
                    return ServiceResponse::status(service, STATUS_PATH_SEGMENT_ERROR);
                }
                if path.class == CLASS_IDENTITY {
                    return ServiceResponse::status(service, STATUS_ATTRIBUTE_NOT_SETTABLE);
                }
                if request.data.is_empty() {
                    return ServiceResponse::status(service, STATUS_NOT_ENOUGH_DATA);
                }
                self.store.insert(path, request.data.clone());
                ServiceResponse::ok(service, Vec::new())
            }
            ServiceCode::GET_ATTRIBUTE_LIST => {
                if request.data.is_empty() {
                    return ServiceResponse::status(service, STATUS_NOT_ENOUGH_DATA);
                }
                ServiceResponse::ok(service, request.data.clone())
            }
            ServiceCode(_) => {
                let object = CipPath::object(path.class, path.instance);
                ServiceResponse::ok(service, default_value(&object))
            }
        }
    }

    fn raw_reply(&mut self, bytes: &[u8]) -> RawReply {
        let Some(header) = EncapHeader::parse(bytes) else {
            return RawReply::Silence;
        };
        let payload = bytes.get(HEADER_LEN..).unwrap_or(&[]);
        if usize::from(header.length) != payload.len() {
            return RawReply::Reset;
        }
        if header.options != 0 {
            return RawReply::Silence;
        }
        let Some(command) = EncapCommand::from_code(header.command) else {
            return RawReply::Frame(reply_header(&header, encap::STATUS_INVALID_COMMAND, &[]));
        };
        if command.needs_session() && Some(header.session) != self.session {
            return RawReply::Frame(reply_header(&header, encap::STATUS_INVALID_SESSION, &[]));
        }
        match command {
            EncapCommand::Nop => RawReply::Nothing,
            EncapCommand::RegisterSession => {
                let version = payload
                    .get(0..2)
                    .and_then(|raw| raw.try_into().ok())
                    .map(u16::from_le_bytes);
                if version != Some(encap::PROTOCOL_VERSION) {
                    return RawReply::Frame(reply_header(
                        &header,
                        encap::STATUS_UNSUPPORTED_REVISION,
                        payload,
                    ));
                }
                let handle = self.rng.gen_range(1..=u32::MAX);
                self.session = Some(handle);
                let mut reply = header;
                reply.session = handle;
                RawReply::Frame(reply_header(&reply, encap::STATUS_SUCCESS, payload))
            }
            EncapCommand::UnregisterSession => {
                self.session = None;
                self.connected = false;
                RawReply::Nothing
            }
            EncapCommand::SendRrData | EncapCommand::SendUnitData => {
                let service = payload.get(16).copied().unwrap_or(0);
                let cip = [service | 0x80, 0, 0, 0];
                let body = encap::send_rr_data_payload(&cip);
                RawReply::Frame(reply_header(&header, encap::STATUS_SUCCESS, &body))
            }
            EncapCommand::ListIdentity
            | EncapCommand::ListServices
            | EncapCommand::ListInterfaces => {
                let body = 0_u16.to_le_bytes();
                RawReply::Frame(reply_header(&header, encap::STATUS_SUCCESS, &body))
            }
        }
    }
}

enum RawReply {
    Frame(Vec<u8>),
    Nothing,
    Silence,
    Reset,
}

fn reply_header(request: &EncapHeader, status: u32, body: &[u8]) -> Vec<u8> {
    let mut header = *request;
    header.status = status;
    header.length = u16::try_from(body.len()).unwrap_or(u16::MAX);
    let mut out = header.encode();
    out.extend_from_slice(body);
    out
}

fn default_value(path: &CipPath) -> Vec<u8> {
    match (path.class, path.attribute) {
        (CLASS_IDENTITY, Some(1)) => vec![0x01, 0x00],
        (CLASS_IDENTITY, Some(2)) => vec![0x0C, 0x00],
        (CLASS_IDENTITY, Some(7)) => b"\x0ccipstress-emu".to_vec(),
        (CLASS_IDENTITY, None) => vec![0x01, 0x00, 0x0C, 0x00, 0x2A, 0x00, 0x01, 0x01],
        _ => vec![0; 4],
    }
}

#[async_trait]
impl Client for EmulatedClient {
    async fn connect(&mut self, _host: &str, _port: u16) -> ClientResult<()> {
        if self.roll_failure() {
            sleep(self.settings.response_timeout).await;
            return Err(ClientError::ConnectFailed {
                message: "emulated adapter refused session registration".to_owned(),
            });
        }
        let latency = self.response_latency();
        sleep(latency).await;
        self.connected = true;
        self.session = Some(self.rng.gen_range(1..=u32::MAX));
        Ok(())
    }

    async fn disconnect(&mut self) -> ClientResult<()> {
        self.connected = false;
        self.session = None;
        self.connections.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn invoke_service(&mut self, request: &ServiceRequest) -> ClientResult<ServiceResponse> {
        self.exchange().await?;
        Ok(self.respond(request))
    }

    async fn read_attribute(&mut self, path: &CipPath) -> ClientResult<ServiceResponse> {
        self.invoke_service(&ServiceRequest::get_attribute_single(*path))
            .await
    }

    async fn write_attribute(
        &mut self,
        path: &CipPath,
        data: &[u8],
    ) -> ClientResult<ServiceResponse> {
        let request = ServiceRequest::new(ServiceCode::SET_ATTRIBUTE_SINGLE, *path, data.to_vec());
        self.invoke_service(&request).await
    }

    async fn forward_open(&mut self, params: &IoConnectionParams) -> ClientResult<IoConnection> {
        self.exchange().await?;
        let size_ok = params.o_to_t_size > 0
            && params.t_to_o_size > 0
            && (params.transport == IoTransport::Class3
                || (params.o_to_t_size <= MAX_CLASS1_SIZE && params.t_to_o_size <= MAX_CLASS1_SIZE));
        if !size_ok {
            return Err(ClientError::Transport {
                message: "forward open rejected: status 0x01 extended 0x0109 (invalid size)"
                    .to_owned(),
            });
        }
        if params.transport == IoTransport::Class1 && params.connection_point.class != CLASS_ASSEMBLY
        {
            return Err(ClientError::Transport {
                message: "forward open rejected: status 0x01 extended 0x0315 (invalid segment)"
                    .to_owned(),
            });
        }
        let o_to_t_id = self.next_connection_id;
        let t_to_o_id = o_to_t_id.wrapping_add(1);
        self.next_connection_id = o_to_t_id.wrapping_add(2);
        let serial = self.next_serial;
        self.next_serial = serial.wrapping_add(1);
        self.connections
            .insert(o_to_t_id, vec![0; params.t_to_o_size]);
        Ok(IoConnection {
            o_to_t_id,
            t_to_o_id,
            serial,
            params: params.clone(),
        })
    }

    async fn forward_close(&mut self, connection: &IoConnection) -> ClientResult<()> {
        self.exchange().await?;
        match self.connections.remove(&connection.o_to_t_id) {
            Some(_) => Ok(()),
            None => Err(ClientError::Transport {
                message: "forward close rejected: status 0x01 extended 0x0107 (unknown connection)"
                    .to_owned(),
            }),
        }
    }

    async fn send_io_data(&mut self, connection: &IoConnection, data: &[u8]) -> ClientResult<()> {
        if !self.connected {
            return Err(ClientError::NotConnected);
        }
        if self.roll_failure() {
            return Err(self.timeout().await);
        }
        match self.connections.get_mut(&connection.o_to_t_id) {
            Some(slot) => {
                slot.clear();
                slot.extend_from_slice(data);
                Ok(())
            }
            None => Err(ClientError::Transport {
                message: format!("cyclic connection 0x{:08X} is not open", connection.o_to_t_id),
            }),
        }
    }

    async fn receive_io_data(&mut self, connection: &IoConnection) -> ClientResult<Vec<u8>> {
        self.exchange().await?;
        let size = connection.params.t_to_o_size;
        match self.connections.get(&connection.o_to_t_id) {
            Some(last) => {
                let mut echo = last.clone();
                echo.resize(size, 0);
                Ok(echo)
            }
            None => Err(ClientError::Transport {
                message: format!("cyclic connection 0x{:08X} is not open", connection.o_to_t_id),
            }),
        }
    }

    async fn send_raw(&mut self, frame: &RawFrame) -> ClientResult<Vec<u8>> {
        if !self.connected {
            return Err(ClientError::NotConnected);
        }
        let segments = frame.segments.len();
        for _ in 1..segments {
            sleep(frame.inter_segment_delay).await;
        }
        let latency = self.response_latency();
        sleep(latency).await;

        match self.raw_reply(&frame.concat()) {
            RawReply::Frame(bytes) if frame.expect_reply => Ok(bytes),
            RawReply::Frame(_) | RawReply::Nothing => Ok(Vec::new()),
            RawReply::Silence => {
                if frame.expect_reply {
                    Err(self.timeout().await)
                } else {
                    Ok(Vec::new())
                }
            }
            RawReply::Reset => {
                self.connected = false;
                self.session = None;
                self.connections.clear();
                Err(ClientError::ConnectionReset)
            }
        }
    }
}
