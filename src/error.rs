//! Shared error kinds for the engine, plus the bounded error-description
//! formatter described in the error handling design.
//!
//! Every public operation on [`crate::connection::WebSocketConnection`] returns
//! a `Result<_, Error>`. Errors also carry an [`ErrorKind`] so a consumer can
//! branch on category (e.g. "close the connection" vs. "log and retry")
//! without string-matching the description.

use std::io;
use thiserror::Error;

/// Coarse classification of an [`Error`], used by consumers that want to
/// branch on category rather than match a specific variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Null or out-of-range argument from the consumer.
    InvalidParameter,
    /// Allocation failed, or a control-frame payload exceeds the consumer's buffer.
    NotEnoughMemory,
    /// Operation attempted in the wrong state.
    InvalidOperation,
    /// Supplied buffer cannot hold a control frame.
    InsufficientBuffer,
    /// Payload exceeds `max_payload_length`.
    InvalidBlockLength,
    /// Underlying transport read/write failed with a non-recoverable code.
    TransportFailure,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("receive: supplied buffer length is zero")]
    InvalidParameter,

    #[error("receive: control frame payload ({needed} bytes) does not fit in the supplied buffer ({available} bytes)")]
    InsufficientBuffer { needed: u64, available: usize },

    #[error("receive: declared payload length {declared} exceeds max_payload_length {max}")]
    InvalidBlockLength { declared: u64, max: u64 },

    #[error("{0}")]
    InvalidOperation(&'static str),

    #[error("transport failure during {operation}: {source}")]
    TransportFailure {
        operation: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("handshake: Connection header missing or does not contain the Upgrade token")]
    NoConnectionUpgrade,

    #[error("handshake: Upgrade header missing or not equal to \"websocket\"")]
    NoUpgradeWebsocket,

    #[error("handshake: required header {0} is empty or exceeds the maximum header length")]
    InvalidHeaderLength(&'static str),

    #[error("handshake: Sec-WebSocket-Key header missing from the request")]
    NoSecWebsocketKey,

    #[error("frame: invalid opcode 0x{0:x}")]
    InvalidOpcode(u8),

    #[error("frame: payload is not valid UTF-8: {source}")]
    InvalidUtf8 {
        #[from]
        source: std::string::FromUtf8Error,
    },

    #[error("registry: failed to acquire the client registry lock within the bounded wait")]
    RegistryLockTimeout,
}

impl Error {
    /// The [`ErrorKind`] this error is classified under, per the error
    /// handling design (section 7).
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidParameter => ErrorKind::InvalidParameter,
            Error::InsufficientBuffer { .. } => ErrorKind::InsufficientBuffer,
            Error::InvalidBlockLength { .. } => ErrorKind::InvalidBlockLength,
            Error::InvalidOperation(_) => ErrorKind::InvalidOperation,
            Error::TransportFailure { .. } => ErrorKind::TransportFailure,
            Error::NoConnectionUpgrade
            | Error::NoUpgradeWebsocket
            | Error::InvalidHeaderLength(_)
            | Error::NoSecWebsocketKey => ErrorKind::InvalidOperation,
            Error::InvalidOpcode(_) => ErrorKind::InvalidOperation,
            Error::InvalidUtf8 { .. } => ErrorKind::InvalidOperation,
            Error::RegistryLockTimeout => ErrorKind::NotEnoughMemory,
        }
    }

    /// Renders a single-line description truncated to `max_len` bytes, the
    /// way the reference engine bounds its error-description buffer by
    /// `error_buffer_length`. Truncation happens on a char boundary so the
    /// result is always valid UTF-8.
    pub fn describe(&self, max_len: usize) -> String {
        let full = self.to_string();
        if full.len() <= max_len {
            return full;
        }
        let mut end = max_len;
        while end > 0 && !full.is_char_boundary(end) {
            end -= 1;
        }
        full[..end].to_string()
    }
}
