//! A minimal echo server demonstrating the engine end to end: accept a
//! connection, perform the handshake, then echo every text/binary message
//! back and respond to pings with pongs until the client closes.
//!
//! Spawns one OS thread per connection (`std::thread::spawn`), mirroring
//! the shape of the teacher's `tokio::spawn`-per-connection examples but
//! blocking, per the engine's synchronous concurrency model.

use std::net::{TcpListener, TcpStream};
use std::thread;

use ws_host_engine::config::EngineConfig;
use ws_host_engine::connection::WebSocketConnection;
use ws_host_engine::frame::{BufferType, OpCode};
use ws_host_engine::host::{self, BlockingTcpTransport, RawHttpRequest, RawHttpResponse};
use ws_host_engine::registry::Registry;

fn handle_connection(stream: TcpStream, registry: &Registry) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let request = match host::buffered_reader(&stream)
        .and_then(|mut reader| RawHttpRequest::read_from(&mut reader))
    {
        Ok(request) => request,
        Err(e) => {
            log::warn!("{peer}: failed to read request: {e}");
            return;
        }
    };

    let transport = match BlockingTcpTransport::new(stream) {
        Ok(t) => t,
        Err(e) => {
            log::warn!("{peer}: failed to prepare transport: {e}");
            return;
        }
    };

    let mut connection = WebSocketConnection::with_config(transport, EngineConfig::default());
    connection.initialize();

    let mut response = RawHttpResponse::default();
    if let Err(e) = connection.perform_handshake(&request, &mut response) {
        log::warn!("{peer}: handshake failed: {}", e.describe(4096));
        return;
    }

    let id = Registry::new_identity();
    registry.add(id);
    log::info!("{peer}: connected (registry size {:?})", registry.count());

    let mut buf = vec![0u8; 64 * 1024];
    loop {
        match connection.receive(&mut buf) {
            Ok((n, BufferType::UtfMessage)) | Ok((n, BufferType::BinaryMessage)) => {
                if let Err(e) = connection.send(OpCode::Binary, true, &buf[..n]) {
                    log::warn!("{peer}: echo send failed: {}", e.describe(4096));
                    break;
                }
            }
            Ok((_, BufferType::UtfFragment)) | Ok((_, BufferType::BinaryFragment)) => {
                // Demo keeps it simple and only echoes complete messages.
            }
            Ok((n, BufferType::Ping)) => {
                if connection.send_pong(&buf[..n]).is_err() {
                    break;
                }
            }
            Ok((_, BufferType::Pong)) => {}
            Ok((n, BufferType::Close)) => {
                let _ = connection.send_close(&buf[..n]);
                break;
            }
            Err(e) => {
                log::warn!("{peer}: receive failed: {}", e.describe(4096));
                break;
            }
        }
    }

    registry.remove_by_identity(id);
    connection.free();
    log::info!("{peer}: disconnected");
}

fn main() -> std::io::Result<()> {
    env_logger::init();

    let listener = TcpListener::bind("127.0.0.1:9001")?;
    log::info!("listening on {}", listener.local_addr()?);

    let registry = std::sync::Arc::new(Registry::new());

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                log::warn!("accept failed: {e}");
                continue;
            }
        };
        let registry = registry.clone();
        thread::spawn(move || handle_connection(stream, &registry));
    }

    Ok(())
}
