//! Engine configuration, in the spirit of the teacher crate's plain
//! `Default`-deriving config structs threaded through the connection
//! objects at construction time.

/// Configuration for one [`crate::connection::WebSocketConnection`].
///
/// `max_payload_length` bounds the payload size the Receive State Machine
/// will accept per frame (section 3, invariant 4); `error_buffer_length`
/// bounds the human-readable error description the engine renders
/// (section 7).
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub max_payload_length: u64,
    pub error_buffer_length: usize,
}

/// 4 MiB, per the reference engine's literal `MaxPayloadLength` (its comment
/// claiming "4 GB" is a documentation bug in the source; the literal wins).
pub const DEFAULT_MAX_PAYLOAD_LENGTH: u64 = 4 * 1024 * 1024;

/// Matches the reference engine's `ErrorBufferLength`.
pub const DEFAULT_ERROR_BUFFER_LENGTH: usize = 4096;

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_payload_length: DEFAULT_MAX_PAYLOAD_LENGTH,
            error_buffer_length: DEFAULT_ERROR_BUFFER_LENGTH,
        }
    }
}
