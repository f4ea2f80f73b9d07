//! Reference implementations of [`Transport`] and the HTTP request/response
//! abstractions (SPEC_FULL section 4.8), so the crate is runnable end to
//! end without a consumer supplying their own host. These are
//! demonstrations, not the protocol core: a real host module (an
//! ISAPI-style filter, a hyper service, anything else) would supply its
//! own instead.

use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::TcpStream;

use crate::http::{HttpRequest, HttpResponse};
use crate::transport::{ReadOutcome, Transport};

/// A [`Transport`] over a plain blocking `TcpStream`. Generalizes the
/// teacher's `BufReader`/`WriteHalf` split to a single synchronous stream,
/// since there is no task to split across here (section 5: one dedicated
/// thread per connection, no cooperative suspension).
pub struct BlockingTcpTransport {
    stream: TcpStream,
    buffering_disabled: bool,
}

impl BlockingTcpTransport {
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        stream.set_nodelay(true)?;
        Ok(BlockingTcpTransport {
            stream,
            buffering_disabled: false,
        })
    }
}

impl Transport for BlockingTcpTransport {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<ReadOutcome> {
        match self.stream.read(dst) {
            Ok(0) => Ok(ReadOutcome {
                bytes_read: 0,
                more_expected: false,
            }),
            Ok(n) => Ok(ReadOutcome {
                bytes_read: n,
                more_expected: false,
            }),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(ReadOutcome {
                bytes_read: 0,
                more_expected: true,
            }),
            Err(e) => Err(e),
        }
    }

    fn write_chunk(&mut self, src: &[u8]) -> io::Result<()> {
        self.stream.write_all(src)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }

    fn disable_buffering(&mut self) -> io::Result<()> {
        // TCP_NODELAY is already set at construction; this flag just
        // records the call for diagnostics/tests.
        self.buffering_disabled = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        // A plain TcpStream has no direct liveness probe short of a
        // read/write attempt; peer_addr() fails once the socket is torn
        // down locally, which is the best local-only signal available.
        self.stream.peer_addr().is_ok()
    }
}

/// A parsed HTTP/1.1 request line + headers, read directly off a buffered
/// reader. Generalizes the teacher's hand-rolled `request.rs` (which
/// scanned for a `Sec-WebSocket-Key:` substring) into header storage any
/// [`HttpRequest`] consumer can query.
pub struct RawHttpRequest {
    pub method: String,
    pub path: String,
    headers: HashMap<String, String>,
}

impl RawHttpRequest {
    /// Reads a request line and headers (terminated by an empty line) from
    /// `reader`. Does not consume any bytes past the blank line.
    pub fn read_from<R: BufRead>(reader: &mut R) -> io::Result<Self> {
        let mut request_line = String::new();
        reader.read_line(&mut request_line)?;
        let mut parts = request_line.split_whitespace();
        let method = parts.next().unwrap_or("").to_string();
        let path = parts.next().unwrap_or("/").to_string();

        let mut headers = HashMap::new();
        loop {
            let mut line = String::new();
            let bytes_read = reader.read_line(&mut line)?;
            if bytes_read == 0 || line == "\r\n" || line == "\n" {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim().to_string(), value.trim().to_string());
            }
        }

        Ok(RawHttpRequest {
            method,
            path,
            headers,
        })
    }
}

impl HttpRequest for RawHttpRequest {
    fn get_request_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An in-memory staged HTTP response. [`WebSocketConnection::perform_handshake`]
/// renders this through the connection's transport automatically; use
/// [`RawHttpResponse::write_to`] directly only if a host manages its own
/// response channel separately from the engine's transport.
///
/// [`WebSocketConnection::perform_handshake`]: crate::connection::WebSocketConnection::perform_handshake
#[derive(Default)]
pub struct RawHttpResponse {
    status: (u16, String),
    headers: Vec<(String, String)>,
}

impl RawHttpResponse {
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.render())?;
        writer.flush()
    }
}

impl HttpResponse for RawHttpResponse {
    fn clear_response(&mut self) {
        self.status = (0, String::new());
        self.headers.clear();
    }

    fn set_status(&mut self, code: u16, reason: &str) {
        self.status = (code, reason.to_string());
    }

    fn set_response_header(&mut self, name: &str, value: &str, replace: bool) {
        if replace {
            self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        }
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn render(&self) -> Vec<u8> {
        let mut out = format!("HTTP/1.1 {} {}\r\n", self.status.0, self.status.1).into_bytes();
        for (name, value) in &self.headers {
            out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out
    }
}

/// Convenience constructor pairing a buffered reader over the same stream
/// the [`BlockingTcpTransport`] will later drive directly.
pub fn buffered_reader(stream: &TcpStream) -> io::Result<BufReader<TcpStream>> {
    Ok(BufReader::new(stream.try_clone()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_http_request_parses_headers_case_insensitively() {
        let raw = "GET /chat HTTP/1.1\r\nHost: example.com\r\nUpgrade: websocket\r\n\r\n";
        let mut reader = io::BufReader::new(raw.as_bytes());
        let request = RawHttpRequest::read_from(&mut reader).unwrap();
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/chat");
        assert_eq!(request.get_request_header("upgrade"), Some("websocket"));
    }

    #[test]
    fn raw_http_response_renders_status_line_and_headers() {
        let mut response = RawHttpResponse::default();
        response.set_status(101, "Switching Protocols");
        response.set_response_header("Connection", "Upgrade", true);
        let mut out = Vec::new();
        response.write_to(&mut out).unwrap();
        let rendered = String::from_utf8(out).unwrap();
        assert!(rendered.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(rendered.contains("Connection: Upgrade\r\n"));
        assert!(rendered.ends_with("\r\n\r\n"));
    }

    #[test]
    fn set_response_header_replace_removes_prior_value() {
        let mut response = RawHttpResponse::default();
        response.set_response_header("X-Foo", "one", true);
        response.set_response_header("X-Foo", "two", true);
        let mut out = Vec::new();
        response.write_to(&mut out).unwrap();
        let rendered = String::from_utf8(out).unwrap();
        assert_eq!(rendered.matches("X-Foo").count(), 1);
        assert!(rendered.contains("X-Foo: two"));
    }
}
