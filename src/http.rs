//! The HTTP request/response abstraction consumed for the handshake
//! (section 6). The engine never parses a raw HTTP request itself — it
//! asks the host for header values and tells the host what to write back.
//!
//! This plays the role the teacher crate gives its hand-rolled
//! `HttpRequest` (request.rs): a thin accessor over headers the host has
//! already parsed, kept deliberately narrow so any host (an ISAPI-style
//! module, a hyper service, a raw-socket listener) can implement it.

/// Read-only view of the inbound HTTP Upgrade request's headers.
pub trait HttpRequest {
    /// Looks up a header by name, case-insensitively. Returns `None` if
    /// absent, matching the reference's `(ptr, len)` pair collapsing to a
    /// null pointer when a header is missing.
    fn get_request_header(&self, name: &str) -> Option<&str>;
}

/// Write-only sink for composing the 101 Switching Protocols response.
pub trait HttpResponse {
    /// Discards any previously staged status/headers.
    fn clear_response(&mut self);

    /// Sets the response status line.
    fn set_status(&mut self, code: u16, reason: &str);

    /// Sets (or replaces) a response header.
    fn set_response_header(&mut self, name: &str, value: &str, replace: bool);

    /// Renders the staged status line and headers as raw HTTP bytes,
    /// terminated by the blank line separating headers from body. The
    /// Handshake Responder (section 4.2) pushes this through the
    /// connection's transport before flushing, so the 101 response
    /// actually reaches the wire instead of sitting in the staging object.
    fn render(&self) -> Vec<u8>;
}
