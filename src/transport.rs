//! The transport abstraction consumed by the core (section 6). The engine
//! never opens a socket itself; it is handed something that implements
//! this trait and drives it call by call from Phases A/B of `receive` and
//! from `send`.
//!
//! This mirrors the role the teacher crate gives `AsyncRead`/`AsyncWrite`
//! bounds on its `Writer`/`ReadStream`, generalized to a blocking,
//! synchronous call shape per the concurrency model (section 5): the
//! engine is not internally concurrent and suspends only by blocking
//! inside a transport call, never cooperatively.

use std::io;

/// Outcome of one `read` call.
pub struct ReadOutcome {
    pub bytes_read: usize,
    /// True if the transport signalled that more data may still be on the
    /// wire even though this call came back short (the reference engine's
    /// `ERROR_MORE_DATA` / `ERROR_HANDLE_EOF` equivalents) — non-fatal.
    pub more_expected: bool,
}

/// A transport the engine reads frames from and writes frames to. One
/// instance is owned by exactly one [`crate::connection::WebSocketConnection`]
/// and is never shared across threads (section 5).
pub trait Transport {
    /// Reads up to `dst.len()` bytes into `dst`. Returns the number of bytes
    /// actually read (which may be less than `dst.len()`, or zero while the
    /// transport has nothing ready) and whether more data may still follow.
    fn read(&mut self, dst: &mut [u8]) -> io::Result<ReadOutcome>;

    /// Writes `src` in full, retrying on partial writes by advancing an
    /// offset until drained (section 4.5).
    fn write_chunk(&mut self, src: &[u8]) -> io::Result<()>;

    /// Flushes any buffered output.
    fn flush(&mut self) -> io::Result<()>;

    /// Called once, after the handshake response has been written, to
    /// disable any response buffering the host may have applied so
    /// subsequent frame writes reach the wire promptly.
    fn disable_buffering(&mut self) -> io::Result<()>;

    /// Delegates to the transport's liveness probe (section 4.6). No state
    /// change on the engine side.
    fn is_connected(&self) -> bool;
}
