use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use crate::error::Result;

/// A connected TCP stream implementing `Read` and `Write`.
///
/// This is the fundamental I/O type returned by transport operations.
/// The peer address is captured once at construction so it stays available
/// after the socket has been shut down.
pub struct NetStream {
    inner: TcpStream,
    peer_addr: SocketAddr,
}

impl Read for NetStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for NetStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl NetStream {
    pub(crate) fn from_tcp(inner: TcpStream, peer_addr: SocketAddr) -> Self {
        Self { inner, peer_addr }
    }

    /// Remote address of the connected peer.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Local address of this end of the connection.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.inner.local_addr().map_err(Into::into)
    }

    /// Enable or disable `TCP_NODELAY` (send coalescing).
    pub fn set_nodelay(&self, nodelay: bool) -> Result<()> {
        self.inner.set_nodelay(nodelay).map_err(Into::into)
    }

    /// Whether `TCP_NODELAY` is set.
    pub fn nodelay(&self) -> Result<bool> {
        self.inner.nodelay().map_err(Into::into)
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_write_timeout(timeout).map_err(Into::into)
    }

    /// Try to clone this stream (creates a new file descriptor for the same socket).
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.inner.try_clone()?;
        Ok(Self::from_tcp(cloned, self.peer_addr))
    }

    /// Shut down both directions of the socket.
    ///
    /// Every clone of this stream observes the shutdown: blocked reads return
    /// end-of-stream and later writes fail. Shutting down a socket the peer
    /// already tore down is not an error.
    pub fn shutdown(&self) -> Result<()> {
        match self.inner.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

impl std::fmt::Debug for NetStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetStream")
            .field("peer_addr", &self.peer_addr)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::thread;

    use crate::tcp::TcpTransport;

    fn pair() -> (super::NetStream, super::NetStream) {
        let listener = TcpTransport::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr();
        let client = thread::spawn(move || TcpTransport::connect(addr).unwrap());
        let (server, _) = listener.accept().unwrap();
        (server, client.join().unwrap())
    }

    #[test]
    fn shutdown_unblocks_reader_on_clone() {
        let (server, _client) = pair();
        let mut reader = server.try_clone().unwrap();

        let blocked = thread::spawn(move || {
            let mut buf = [0u8; 8];
            reader.read(&mut buf).unwrap()
        });

        server.shutdown().unwrap();
        assert_eq!(blocked.join().unwrap(), 0);
    }

    #[test]
    fn shutdown_twice_is_ok() {
        let (server, _client) = pair();
        server.shutdown().unwrap();
        server.shutdown().unwrap();
    }

    #[test]
    fn peer_addr_survives_shutdown() {
        let (server, client) = pair();
        let expected = client.local_addr().unwrap();
        server.shutdown().unwrap();
        assert_eq!(server.peer_addr(), expected);
    }

    #[test]
    fn nodelay_reflects_last_setting() {
        let (server, _client) = pair();
        server.set_nodelay(true).unwrap();
        assert!(server.nodelay().unwrap());
        server.set_nodelay(false).unwrap();
        assert!(!server.nodelay().unwrap());
    }

    #[test]
    fn write_after_shutdown_fails() {
        let (mut server, _client) = pair();
        server.shutdown().unwrap();
        assert!(server.write_all(b"late").is_err());
    }
}
