use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use bytes::Bytes;
use msgserve_frame::{FrameConfig, FrameReader, FrameWriter};
use msgserve_transport::{NetStream, TcpTransport};

use crate::error::Result;

/// Blocking client speaking the server's wire format.
pub struct MessageClient {
    reader: FrameReader<NetStream>,
    writer: FrameWriter<NetStream>,
}

impl MessageClient {
    /// Connect to a server. `config` bounds payloads in both directions and
    /// sets the socket timeouts.
    pub fn connect(
        addr: impl ToSocketAddrs + std::fmt::Display,
        config: FrameConfig,
    ) -> Result<Self> {
        let stream = TcpTransport::connect(addr)?;
        stream.set_nodelay(true)?;
        let reader_stream = stream.try_clone()?;

        let reader = FrameReader::with_config_net(reader_stream, config.clone())?;
        let writer = FrameWriter::with_config_net(stream, config)?;
        Ok(Self { reader, writer })
    }

    /// Send one message.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        self.writer.send(payload).map_err(Into::into)
    }

    /// Receive the next message; `None` once the server closed the connection.
    pub fn recv(&mut self) -> Result<Option<Bytes>> {
        self.reader.read_frame().map_err(Into::into)
    }

    /// Change the read timeout applied to `recv`.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.reader.get_ref().set_read_timeout(timeout)?;
        Ok(())
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.writer.get_ref().peer_addr()
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.writer.get_ref().local_addr()?)
    }

    /// Close both directions; the server sees a clean end of stream.
    pub fn shutdown(&self) -> Result<()> {
        self.writer.get_ref().shutdown()?;
        Ok(())
    }
}

impl std::fmt::Debug for MessageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageClient")
            .field("peer_addr", &self.peer_addr())
            .finish()
    }
}
