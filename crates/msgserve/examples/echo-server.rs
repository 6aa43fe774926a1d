//! Echo server: every message is sent straight back to its sender.
//!
//! Run with:
//!   cargo run --example echo-server -- 7878
//!
//! In another terminal:
//!   cargo run --features cli -- send 127.0.0.1:7878 --data hello --wait

use std::net::{IpAddr, Ipv4Addr};

use msgserve::{ChannelHandler, MessageServer, ServerConfig, ServerEvent};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let port = match std::env::args().nth(1) {
        Some(port) => port.parse()?,
        None => 7878,
    };

    let config = ServerConfig::default().with_bind_host(IpAddr::V4(Ipv4Addr::LOCALHOST));
    let (handler, events) = ChannelHandler::new();
    let server = MessageServer::new(config, handler);
    let addr = server.start(port, Some(64))?;
    eprintln!("Listening on {addr}");

    for event in events {
        match event {
            ServerEvent::Connected(id) => {
                let peer = server.remote_address(id);
                eprintln!("Connection {id} from {peer:?}");
            }
            ServerEvent::Received(id, payload) => {
                eprintln!("Received {} bytes from {id}", payload.len());
                server.send(id, payload);
            }
            ServerEvent::ReceivedError(id, err) => eprintln!("Error on {id}: {err}"),
            ServerEvent::Disconnected(id) => eprintln!("Connection {id} closed"),
        }
    }

    Ok(())
}
