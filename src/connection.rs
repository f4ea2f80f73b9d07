//! The per-connection handle (section 3 "Lifecycle" / section 4.6 / 4.7):
//! binds one [`Transport`] to a [`ReceiveState`] and [`SendState`], and
//! carries the last error description the way the reference engine
//! records status on the connection object itself rather than forcing the
//! consumer to thread a side channel.

use crate::config::EngineConfig;
use crate::error::Error;
use crate::frame::{BufferType, OpCode};
use crate::handshake::{self, ValidatedHeaders};
use crate::http::{HttpRequest, HttpResponse};
use crate::receive::ReceiveState;
use crate::send::SendState;
use crate::transport::Transport;

/// One WebSocket connection, bound to a single `Transport` for its whole
/// lifetime (section 5: never shared across threads, never internally
/// concurrent).
pub struct WebSocketConnection<T: Transport> {
    transport: T,
    config: EngineConfig,
    receive: Option<ReceiveState>,
    send: Option<SendState>,
    validated_headers: Option<ValidatedHeaders>,
    last_error: Option<String>,
}

impl<T: Transport> WebSocketConnection<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, EngineConfig::default())
    }

    pub fn with_config(transport: T, config: EngineConfig) -> Self {
        WebSocketConnection {
            transport,
            config,
            receive: None,
            send: None,
            validated_headers: None,
            last_error: None,
        }
    }

    /// Allocates receive/send state and clears any prior error. Safe to
    /// call again after `free` (section 3's "allocates buffers, zeros
    /// state").
    pub fn initialize(&mut self) {
        self.receive = Some(ReceiveState::new());
        self.send = Some(SendState::new());
        self.last_error = None;
    }

    /// Runs the Handshake Validator and Responder (sections 4.1/4.2)
    /// against a host-supplied request/response pair, renders the staged
    /// 101 response and writes it through the connection's transport,
    /// flushes it, then disables response buffering so subsequent frame
    /// writes reach the wire promptly.
    pub fn perform_handshake(
        &mut self,
        request: &impl HttpRequest,
        response: &mut impl HttpResponse,
    ) -> Result<(), Error> {
        let validated = handshake::validate_request(request).inspect_err(|e| self.note(e))?;
        handshake::build_response(response, &validated).inspect_err(|e| self.note(e))?;

        let rendered = response.render();
        self.transport.write_chunk(&rendered).map_err(|source| {
            let err = Error::TransportFailure {
                operation: "perform_handshake: write response",
                source,
            };
            self.note(&err);
            err
        })?;

        self.transport.flush().map_err(|source| {
            let err = Error::TransportFailure {
                operation: "perform_handshake: flush",
                source,
            };
            self.note(&err);
            err
        })?;
        self.transport.disable_buffering().map_err(|source| {
            let err = Error::TransportFailure {
                operation: "perform_handshake: disable_buffering",
                source,
            };
            self.note(&err);
            err
        })?;

        self.validated_headers = Some(validated);
        Ok(())
    }

    /// Drives one `receive` call (section 4.4) against the bound transport.
    pub fn receive(&mut self, out: &mut [u8]) -> Result<(usize, BufferType), Error> {
        let max_payload_length = self.config.max_payload_length;
        let transport = &mut self.transport;
        let state = self
            .receive
            .as_mut()
            .ok_or(Error::InvalidOperation("receive called before initialize"))?;

        match state.receive(transport, out, max_payload_length) {
            Ok(result) => Ok(result),
            Err(err) => {
                self.last_error = Some(err.describe(self.config.error_buffer_length));
                Err(err)
            }
        }
    }

    /// Emits one outbound frame (section 4.5).
    pub fn send(&mut self, opcode: OpCode, fin: bool, payload: &[u8]) -> Result<(), Error> {
        let transport = &mut self.transport;
        let state = self
            .send
            .as_mut()
            .ok_or(Error::InvalidOperation("send called before initialize"))?;

        match state.send(transport, opcode, fin, payload) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.last_error = Some(err.describe(self.config.error_buffer_length));
                Err(err)
            }
        }
    }

    pub fn send_close(&mut self, payload: &[u8]) -> Result<(), Error> {
        self.send(OpCode::Close, true, payload)
    }

    pub fn send_ping(&mut self, payload: &[u8]) -> Result<(), Error> {
        self.send(OpCode::Ping, true, payload)
    }

    pub fn send_pong(&mut self, payload: &[u8]) -> Result<(), Error> {
        self.send(OpCode::Pong, true, payload)
    }

    /// Delegates to the transport's liveness probe (section 4.6).
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// The last error description recorded on this connection (section 7's
    /// "records the last status and a human-readable description").
    pub fn last_error_description(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Releases receive/send state and the retained handshake headers.
    /// Idempotent (section 4.7).
    pub fn free(&mut self) {
        self.receive = None;
        self.send = None;
        self.validated_headers = None;
    }

    /// Unwraps the bound transport, consuming the connection. Useful for
    /// hosts that want to hand the socket back after a graceful close.
    pub fn into_transport(self) -> T {
        self.transport
    }

    fn note(&mut self, err: &Error) {
        self.last_error = Some(err.describe(self.config.error_buffer_length));
    }
}
