use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use crate::client::{
    Client, IoConnection, IoConnectionParams, RawFrame, ServiceRequest, ServiceResponse,
};
use crate::domain::{CipPath, ReadTarget, ServiceCode, TargetConfig, TargetDescriptor};
use crate::error::{ClientError, ClientResult};
use crate::metrics::{Metric, StreamingSink};
use crate::shutdown::{ShutdownSender, ShutdownSignal, shutdown_channel};

use super::params::{JitterBounds, ScenarioParams};
use super::reconnect::ReconnectPolicy;

pub(crate) fn run_paused<F>(future: F) -> Result<(), String>
where
    F: Future<Output = Result<(), String>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .map_err(|err| format!("Failed to build runtime: {}", err))?;
    runtime.block_on(future)
}

/// Params pointed at a fake endpoint with jitter off and a fast reconnect.
pub(crate) fn test_params(
    sink: &Arc<StreamingSink>,
    interval: Duration,
    duration: Duration,
) -> ScenarioParams {
    ScenarioParams::builder(sink.clone())
        .target("10.0.0.5", 44818)
        .interval(interval)
        .duration(duration)
        .jitter(JitterBounds::none())
        .reconnect(ReconnectPolicy::new(3, Duration::from_millis(10)))
        .build()
}

/// A signal that never fires, plus the sender keeping it alive.
pub(crate) fn quiet_signal() -> (ShutdownSender, ShutdownSignal) {
    let (sender, _) = shutdown_channel();
    let signal = ShutdownSignal::from_sender(&sender);
    (sender, signal)
}

pub(crate) fn metrics_labelled<'metric>(
    metrics: &'metric [Metric],
    label: &str,
) -> Vec<&'metric Metric> {
    metrics
        .iter()
        .filter(|metric| metric.scenario == label)
        .collect()
}

/// Deterministic `Client` double: every operation takes exactly `rtt`,
/// connect results and forward-open results follow their scripts (then
/// succeed), and the link can be dropped after a fixed number of operations.
#[derive(Debug)]
pub(crate) struct ScriptedClient {
    rtt: Duration,
    connect_script: VecDeque<ClientResult<()>>,
    open_script: VecDeque<ClientResult<()>>,
    raw_replies: VecDeque<ClientResult<Vec<u8>>>,
    drop_after: Option<u64>,
    hang: bool,
    connected: bool,
    next_id: u32,
    pub(crate) operations: u64,
    pub(crate) connects: u32,
    pub(crate) disconnects: u32,
    pub(crate) opened: u32,
    pub(crate) closed: u32,
    pub(crate) raw_frames: Vec<RawFrame>,
}

impl ScriptedClient {
    pub(crate) const fn new(rtt: Duration) -> Self {
        Self {
            rtt,
            connect_script: VecDeque::new(),
            open_script: VecDeque::new(),
            raw_replies: VecDeque::new(),
            drop_after: None,
            hang: false,
            connected: false,
            next_id: 1,
            operations: 0,
            connects: 0,
            disconnects: 0,
            opened: 0,
            closed: 0,
            raw_frames: Vec::new(),
        }
    }

    pub(crate) fn connect_script(mut self, script: Vec<ClientResult<()>>) -> Self {
        self.connect_script = script.into();
        self
    }

    pub(crate) fn open_script(mut self, script: Vec<ClientResult<()>>) -> Self {
        self.open_script = script.into();
        self
    }

    /// Replies handed back by `send_raw` in order, then empty replies.
    pub(crate) fn raw_replies(mut self, replies: Vec<ClientResult<Vec<u8>>>) -> Self {
        self.raw_replies = replies.into();
        self
    }

    /// Drops the link once after `operations` completed operations.
    pub(crate) const fn drop_after(mut self, operations: u64) -> Self {
        self.drop_after = Some(operations);
        self
    }

    /// Operations never complete; only cancellation ends them.
    pub(crate) const fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub(crate) fn refused() -> ClientError {
        ClientError::ConnectFailed {
            message: "connection refused".to_owned(),
        }
    }

    async fn operation(&mut self) -> ClientResult<()> {
        if !self.connected {
            return Err(ClientError::NotConnected);
        }
        if self.hang {
            std::future::pending::<()>().await;
        }
        sleep(self.rtt).await;
        self.operations = self.operations.saturating_add(1);
        if self.drop_after == Some(self.operations) {
            self.drop_after = None;
            self.connected = false;
            return Err(ClientError::ConnectionReset);
        }
        Ok(())
    }

    async fn respond(&mut self, service: ServiceCode) -> ClientResult<ServiceResponse> {
        self.operation().await?;
        Ok(ServiceResponse::ok(service, vec![0x01, 0x00]))
    }
}

#[async_trait]
impl Client for ScriptedClient {
    async fn connect(&mut self, _host: &str, _port: u16) -> ClientResult<()> {
        sleep(self.rtt).await;
        self.connects = self.connects.saturating_add(1);
        let result = self.connect_script.pop_front().unwrap_or(Ok(()));
        self.connected = result.is_ok();
        result
    }

    async fn disconnect(&mut self) -> ClientResult<()> {
        self.disconnects = self.disconnects.saturating_add(1);
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn invoke_service(&mut self, request: &ServiceRequest) -> ClientResult<ServiceResponse> {
        self.respond(request.service).await
    }

    async fn read_attribute(&mut self, _path: &CipPath) -> ClientResult<ServiceResponse> {
        self.respond(ServiceCode::GET_ATTRIBUTE_SINGLE).await
    }

    async fn write_attribute(
        &mut self,
        _path: &CipPath,
        _data: &[u8],
    ) -> ClientResult<ServiceResponse> {
        self.respond(ServiceCode::SET_ATTRIBUTE_SINGLE).await
    }

    async fn forward_open(&mut self, params: &IoConnectionParams) -> ClientResult<IoConnection> {
        self.operation().await?;
        self.open_script.pop_front().unwrap_or(Ok(()))?;
        self.opened = self.opened.saturating_add(1);
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        Ok(IoConnection {
            o_to_t_id: id,
            t_to_o_id: id,
            serial: 0,
            params: params.clone(),
        })
    }

    async fn forward_close(&mut self, _connection: &IoConnection) -> ClientResult<()> {
        self.operation().await?;
        self.closed = self.closed.saturating_add(1);
        Ok(())
    }

    async fn send_io_data(&mut self, _connection: &IoConnection, _data: &[u8]) -> ClientResult<()> {
        self.operation().await
    }

    async fn receive_io_data(&mut self, connection: &IoConnection) -> ClientResult<Vec<u8>> {
        self.operation().await?;
        Ok(vec![0; connection.params.t_to_o_size])
    }

    async fn send_raw(&mut self, frame: &RawFrame) -> ClientResult<Vec<u8>> {
        self.operation().await?;
        self.raw_frames.push(frame.clone());
        self.raw_replies.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub(crate) fn read_targets(count: u16) -> TargetConfig {
    TargetConfig {
        targets: (1..=count)
            .map(|attribute| {
                TargetDescriptor::Read(ReadTarget {
                    name: format!("read_{}", attribute),
                    service: ServiceCode::GET_ATTRIBUTE_SINGLE,
                    path: CipPath::IDENTITY.with_attribute(attribute),
                })
            })
            .collect(),
        io: None,
    }
}
