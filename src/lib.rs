//! A server-side WebSocket protocol engine embedded inside a host HTTP
//! server module.
//!
//! The engine negotiates the HTTP Upgrade handshake, then drives RFC 6455
//! frame parsing, payload unmasking, fragment reassembly, and frame
//! assembly for outbound messages. It is deliberately **not** async: one
//! [`connection::WebSocketConnection`] is owned by exactly one
//! consumer-driven worker (typically a dedicated thread per connection)
//! and every operation may block inside a [`transport::Transport`] call,
//! but never suspends cooperatively. See [`host`] for a reference
//! `Transport`/HTTP implementation over a blocking `TcpStream`.

pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod host;
pub mod http;
pub mod receive;
pub mod registry;
pub mod send;
pub mod transport;
