//! The Frame Serializer (section 4.5): builds one RFC 6455 frame header
//! for an outbound buffer and writes header + payload to the transport in
//! a single logical call, retrying on partial writes.
//!
//! Servers never mask outbound frames (RFC 6455 section 5.1); this
//! serializer never sets the mask bit, mirroring the teacher's `write.rs`
//! which likewise only ever produces unmasked server frames.

use bytes::BytesMut;

use crate::error::Error;
use crate::frame::OpCode;
use crate::transport::Transport;

/// Per-connection send-side state (section 3's "Send stream state").
/// Tracks whether the connection is mid-fragmented-message so continuation
/// frames get opcode `0x0` instead of repeating Text/Binary.
#[derive(Debug, Default)]
pub struct SendState {
    in_fragment: bool,
}

impl SendState {
    pub fn new() -> Self {
        SendState { in_fragment: false }
    }

    fn header_for(&mut self, opcode: OpCode, fin: bool, payload_len: usize) -> Vec<u8> {
        let wire_opcode = if opcode.is_control() {
            opcode
        } else if self.in_fragment {
            OpCode::Continuation
        } else {
            opcode
        };

        if !opcode.is_control() {
            self.in_fragment = !fin;
        }

        let mut header = Vec::with_capacity(10);
        let first_byte = ((fin as u8) << 7) | wire_opcode.as_u8();
        header.push(first_byte);

        if payload_len <= 125 {
            header.push(payload_len as u8);
        } else if payload_len <= u16::MAX as usize {
            header.push(126);
            header.extend_from_slice(&(payload_len as u16).to_be_bytes());
        } else {
            header.push(127);
            header.extend_from_slice(&(payload_len as u64).to_be_bytes());
        }

        header
    }

    /// Sends one frame: `opcode`/`fin` pick the wire opcode (collapsing to
    /// `Continuation` mid-fragment per the table in section 4.5),
    /// `payload` is written unmasked, header first, in a single buffer.
    pub fn send<T: Transport>(
        &mut self,
        transport: &mut T,
        opcode: OpCode,
        fin: bool,
        payload: &[u8],
    ) -> Result<(), Error> {
        let header = self.header_for(opcode, fin, payload.len());

        let mut frame = BytesMut::with_capacity(header.len() + payload.len());
        frame.extend_from_slice(&header);
        frame.extend_from_slice(payload);

        transport
            .write_chunk(&frame)
            .map_err(|source| Error::TransportFailure {
                operation: "send",
                source,
            })?;
        transport
            .flush()
            .map_err(|source| Error::TransportFailure {
                operation: "send: flush",
                source,
            })?;
        Ok(())
    }

    pub fn send_text(&mut self, transport: &mut impl Transport, fin: bool, payload: &str) -> Result<(), Error> {
        self.send(transport, OpCode::Text, fin, payload.as_bytes())
    }

    pub fn send_binary(&mut self, transport: &mut impl Transport, fin: bool, payload: &[u8]) -> Result<(), Error> {
        self.send(transport, OpCode::Binary, fin, payload)
    }

    pub fn send_close(&mut self, transport: &mut impl Transport, payload: &[u8]) -> Result<(), Error> {
        self.send(transport, OpCode::Close, true, payload)
    }

    pub fn send_ping(&mut self, transport: &mut impl Transport, payload: &[u8]) -> Result<(), Error> {
        self.send(transport, OpCode::Ping, true, payload)
    }

    pub fn send_pong(&mut self, transport: &mut impl Transport, payload: &[u8]) -> Result<(), Error> {
        self.send(transport, OpCode::Pong, true, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ReadOutcome;
    use std::io;

    #[derive(Default)]
    struct RecordingTransport {
        written: Vec<u8>,
        max_write: usize,
    }

    impl Transport for RecordingTransport {
        fn read(&mut self, _dst: &mut [u8]) -> io::Result<ReadOutcome> {
            Ok(ReadOutcome {
                bytes_read: 0,
                more_expected: false,
            })
        }
        fn write_chunk(&mut self, src: &[u8]) -> io::Result<()> {
            if self.max_write == 0 {
                self.written.extend_from_slice(src);
                return Ok(());
            }
            // Exercise the "retry on partial write" path by splitting the
            // write into chunks no larger than max_write.
            for chunk in src.chunks(self.max_write) {
                self.written.extend_from_slice(chunk);
            }
            Ok(())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
        fn disable_buffering(&mut self) -> io::Result<()> {
            Ok(())
        }
        fn is_connected(&self) -> bool {
            true
        }
    }

    #[test]
    fn unfragmented_text_frame_is_unmasked_and_fin_set() {
        let mut transport = RecordingTransport::default();
        let mut send = SendState::new();
        send.send_text(&mut transport, true, "Hello").unwrap();
        assert_eq!(transport.written[0], 0b1000_0001); // fin=1, opcode=text
        assert_eq!(transport.written[1], 5); // unmasked, len=5
        assert_eq!(&transport.written[2..], b"Hello");
    }

    #[test]
    fn fragmented_message_uses_continuation_opcode() {
        let mut transport = RecordingTransport::default();
        let mut send = SendState::new();
        send.send_text(&mut transport, false, "Hel").unwrap();
        assert_eq!(transport.written[0], 0b0000_0001); // fin=0, opcode=text (first frame)

        transport.written.clear();
        send.send_text(&mut transport, true, "lo").unwrap();
        assert_eq!(transport.written[0], 0b1000_0000); // fin=1, opcode=continuation
    }

    #[test]
    fn long_payload_uses_64_bit_length_header() {
        let mut transport = RecordingTransport::default();
        let mut send = SendState::new();
        let payload = vec![0u8; 70_000];
        send.send_binary(&mut transport, true, &payload).unwrap();
        assert_eq!(transport.written[1], 127);
        let len_bytes: [u8; 8] = transport.written[2..10].try_into().unwrap();
        assert_eq!(u64::from_be_bytes(len_bytes), 70_000);
        assert_eq!(transport.written.len(), 10 + 70_000);
    }

    #[test]
    fn mid_length_payload_uses_16_bit_length_header() {
        let mut transport = RecordingTransport::default();
        let mut send = SendState::new();
        let payload = vec![7u8; 1000];
        send.send_binary(&mut transport, true, &payload).unwrap();
        assert_eq!(transport.written[1], 126);
        let len_bytes: [u8; 2] = transport.written[2..4].try_into().unwrap();
        assert_eq!(u16::from_be_bytes(len_bytes), 1000);
    }

    #[test]
    fn control_frames_are_never_fragmented() {
        let mut transport = RecordingTransport::default();
        let mut send = SendState::new();
        send.in_fragment = true; // pretend mid-message
        send.send_ping(&mut transport, b"ping-payload").unwrap();
        let opcode = transport.written[0] & 0b0000_1111;
        assert_eq!(opcode, OpCode::Ping.as_u8());
    }

    #[test]
    fn partial_writes_are_retried_until_drained() {
        let mut transport = RecordingTransport {
            written: Vec::new(),
            max_write: 3,
        };
        let mut send = SendState::new();
        let payload = vec![42u8; 50];
        send.send_binary(&mut transport, true, &payload).unwrap();
        assert_eq!(&transport.written[2..], payload.as_slice());
    }
}
