//! The `Client` capability the scenarios drive, plus an in-process emulated
//! adapter implementing it.
//!
//! The real transport and the CIP codec live outside this crate; scenarios
//! only ever see the trait below and treat `ServiceResponse::status == 0` as
//! protocol-level success.
mod emulated;
pub mod encap;
mod types;


pub use emulated::{EmulatedClient, EmulatorSettings};
pub use types::{IoConnection, IoConnectionParams, RawFrame, ServiceRequest, ServiceResponse};

use async_trait::async_trait;

use crate::domain::CipPath;
use crate::error::ClientResult;

#[async_trait]
pub trait Client: Send {
    /// Opens the transport and registers a session with the target.
    ///
    /// # Errors
    ///
    /// Returns an error when the target is unreachable or refuses the session.
    async fn connect(&mut self, host: &str, port: u16) -> ClientResult<()>;

    /// Unregisters the session and closes the transport.
    ///
    /// # Errors
    ///
    /// Returns an error when the teardown could not be delivered.
    async fn disconnect(&mut self) -> ClientResult<()>;

    fn is_connected(&self) -> bool;

    /// Sends one explicit request and waits for its response.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or timeout. A non-zero
    /// `status` is not an error at this level.
    async fn invoke_service(&mut self, request: &ServiceRequest) -> ClientResult<ServiceResponse>;

    /// Convenience `Get_Attribute_Single`.
    ///
    /// # Errors
    ///
    /// Same as [`Client::invoke_service`].
    async fn read_attribute(&mut self, path: &CipPath) -> ClientResult<ServiceResponse>;

    /// Convenience `Set_Attribute_Single`.
    ///
    /// # Errors
    ///
    /// Same as [`Client::invoke_service`].
    async fn write_attribute(&mut self, path: &CipPath, data: &[u8])
    -> ClientResult<ServiceResponse>;

    /// Establishes a cyclic connection.
    ///
    /// # Errors
    ///
    /// Returns an error when the target rejects the open handshake.
    async fn forward_open(&mut self, params: &IoConnectionParams) -> ClientResult<IoConnection>;

    /// Tears down a cyclic connection.
    ///
    /// # Errors
    ///
    /// Returns an error when the close handshake fails.
    async fn forward_close(&mut self, connection: &IoConnection) -> ClientResult<()>;

    /// Produces one cyclic payload (originator to target).
    ///
    /// # Errors
    ///
    /// Returns an error when the connection is gone or the send fails.
    async fn send_io_data(&mut self, connection: &IoConnection, data: &[u8]) -> ClientResult<()>;

    /// Consumes one cyclic payload (target to originator).
    ///
    /// # Errors
    ///
    /// Returns an error when nothing arrives in time or the connection is gone.
    async fn receive_io_data(&mut self, connection: &IoConnection) -> ClientResult<Vec<u8>>;

    /// Writes pre-built encapsulation bytes straight onto the session stream,
    /// bypassing the codec, and returns whatever the target answers.
    ///
    /// # Errors
    ///
    /// Returns an error when the stream fails or no reply arrives.
    async fn send_raw(&mut self, frame: &RawFrame) -> ClientResult<Vec<u8>>;
}
