//! Async client using the tokio codec against a running msgserve server.
//!
//! Run with:
//!   cargo run --example echo-server -- 7878
//!   cargo run --example async-client --features async -- 127.0.0.1:7878

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use msgserve::frame::MessageCodec;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:7878".to_string());

    let stream = TcpStream::connect(&addr).await?;
    stream.set_nodelay(true)?;
    let mut framed = Framed::new(stream, MessageCodec::new());

    for text in ["hello", "from", "tokio"] {
        framed.send(Bytes::from_static(text.as_bytes())).await?;
        match framed.next().await {
            Some(reply) => println!("reply: {}", String::from_utf8_lossy(&reply?)),
            None => {
                eprintln!("server closed the connection");
                break;
            }
        }
    }

    Ok(())
}
