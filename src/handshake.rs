//! The Handshake Validator (section 4.1) and Handshake Responder
//! (section 4.2).
//!
//! The Accept-key computation keeps the teacher's exact recipe (SHA-1 of
//! key + GUID, base64-encoded) — that part of the reference is already
//! idiomatic. What changes is everything around it: validation now reads
//! from the [`crate::http::HttpRequest`] abstraction instead of scanning
//! raw bytes for a `Sec-WebSocket-Key:` substring, and the comma-list
//! handling for `Connection` is expressed directly rather than recovered
//! from a goto-driven C parser (see design notes).

use base64::prelude::*;
use sha1::{Digest, Sha1};

use crate::error::Error;
use crate::http::{HttpRequest, HttpResponse};

const ACCEPT_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";
const MAX_HEADER_LENGTH: usize = 4096;

const REQUIRED_HEADERS: &[&str] = &["Connection", "Upgrade"];
const OPTIONAL_HEADERS: &[&str] = &[
    "Sec-WebSocket-Version",
    "Sec-WebSocket-Key",
    "Sec-WebSocket-Protocol",
    "Host",
    "User-Agent",
];

/// The request headers the Validator accepted, retained so the Responder
/// can echo them back into the 101 response (section 4.1's "retained
/// request-header list").
#[derive(Debug, Clone, Default)]
pub struct ValidatedHeaders {
    entries: Vec<(String, String)>,
}

impl ValidatedHeaders {
    fn push(&mut self, name: &str, value: &str) {
        self.entries.push((name.to_string(), value.to_string()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// Returns true iff `connection_value`, split on commas and trimmed of
/// ASCII whitespace, contains the token `Upgrade` case-insensitively.
/// Browsers commonly send `"keep-alive, Upgrade"` — a single
/// case-sensitive equality check would reject that.
fn connection_header_has_upgrade(connection_value: &str) -> bool {
    connection_value
        .split(',')
        .map(|token| token.trim())
        .any(|token| token.eq_ignore_ascii_case("Upgrade"))
}

fn header_length_ok(value: &str) -> bool {
    !value.is_empty() && value.len() < MAX_HEADER_LENGTH
}

/// Validates the inbound HTTP Upgrade request per section 4.1 and returns
/// the retained header set on success.
pub fn validate_request(request: &impl HttpRequest) -> Result<ValidatedHeaders, Error> {
    let mut validated = ValidatedHeaders::default();

    let connection = request
        .get_request_header("Connection")
        .ok_or(Error::NoConnectionUpgrade)?;
    if !header_length_ok(connection) {
        return Err(Error::InvalidHeaderLength("Connection"));
    }
    if !connection_header_has_upgrade(connection) {
        return Err(Error::NoConnectionUpgrade);
    }
    validated.push("Connection", connection);

    let upgrade = request
        .get_request_header("Upgrade")
        .ok_or(Error::NoUpgradeWebsocket)?;
    if !header_length_ok(upgrade) {
        return Err(Error::InvalidHeaderLength("Upgrade"));
    }
    if !upgrade.trim().eq_ignore_ascii_case("websocket") {
        return Err(Error::NoUpgradeWebsocket);
    }
    validated.push("Upgrade", upgrade);

    for name in OPTIONAL_HEADERS {
        if let Some(value) = request.get_request_header(name) {
            if header_length_ok(value) {
                validated.push(name, value);
            }
            // Out-of-range optional headers are silently ignored, per
            // section 4.1's length policy — they don't fail validation.
        }
    }

    debug_assert!(REQUIRED_HEADERS.iter().all(|h| validated.get(h).is_some()));
    Ok(validated)
}

fn compute_accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(ACCEPT_GUID.as_bytes());
    BASE64_STANDARD.encode(hasher.finalize())
}

/// Composes the 101 Switching Protocols response per section 4.2: echoes
/// the validated request headers, appends the computed
/// `Sec-WebSocket-Accept`, and guarantees the two headers RFC 6455 requires
/// on the response regardless of what the client happened to send.
pub fn build_response(
    response: &mut impl HttpResponse,
    validated: &ValidatedHeaders,
) -> Result<(), Error> {
    let client_key = validated
        .get("Sec-WebSocket-Key")
        .ok_or(Error::NoSecWebsocketKey)?;
    let accept = compute_accept_key(client_key);

    response.clear_response();
    response.set_status(101, "Switching Protocols");

    for (name, value) in validated.iter() {
        response.set_response_header(name, value, true);
    }

    // The engine composes these, it does not second-guess what the client
    // echoed in its own Connection/Upgrade headers.
    response.set_response_header("Connection", "Upgrade", true);
    response.set_response_header("Upgrade", "websocket", true);
    response.set_response_header("Sec-WebSocket-Accept", &accept, true);

    Ok(())
}
