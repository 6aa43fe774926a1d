use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::NetStream;

const WAKE_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(200);

/// TCP listening socket.
///
/// Provides bind/accept/connect over IPv4 and IPv6. A listener blocked in
/// [`TcpTransport::accept`] is released from another thread through the
/// [`ListenerCloser`] returned by [`TcpTransport::closer`].
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpTransport {
    /// Bind and listen on `addr`. Port 0 picks an ephemeral port; use
    /// [`TcpTransport::local_addr`] to learn which one.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let listener =
            TcpListener::bind(addr).map_err(|e| TransportError::Bind { addr, source: e })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| TransportError::Bind { addr, source: e })?;

        info!(%local_addr, "listening on tcp socket");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<(NetStream, SocketAddr)> {
        let (stream, peer_addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer_addr, "accepted connection");
        Ok((NetStream::from_tcp(stream, peer_addr), peer_addr))
    }

    /// Connect to a listening TCP socket (blocking).
    pub fn connect(addr: impl ToSocketAddrs + std::fmt::Display) -> Result<NetStream> {
        let target = addr.to_string();
        let stream = TcpStream::connect(addr).map_err(|e| TransportError::Connect {
            addr: target.clone(),
            source: e,
        })?;
        let peer_addr = stream.peer_addr().map_err(|e| TransportError::Connect {
            addr: target,
            source: e,
        })?;
        debug!(%peer_addr, "connected to tcp socket");
        Ok(NetStream::from_tcp(stream, peer_addr))
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle that can release a thread blocked in [`TcpTransport::accept`].
    pub fn closer(&self) -> Result<ListenerCloser> {
        Ok(ListenerCloser {
            listener: self.listener.try_clone()?,
            local_addr: self.local_addr,
        })
    }
}

/// Wakes and disables a listener from another thread.
///
/// The standard library has no way to interrupt a blocking `accept`, so
/// closing shuts the listening socket down (Unix) and then makes one
/// throwaway connection to the bound address. Callers pair this with their
/// own stop flag, checked after every `accept` return.
pub struct ListenerCloser {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl ListenerCloser {
    /// Release the blocked acceptor. Best-effort; never fails.
    pub fn close(&self) {
        #[cfg(unix)]
        {
            use std::os::fd::AsRawFd;

            let fd = self.listener.as_raw_fd();
            // SAFETY: `fd` is an open socket descriptor owned by `self.listener`
            // for the duration of this call.
            let rc = unsafe { libc::shutdown(fd, libc::SHUT_RDWR) };
            debug!(rc, addr = %self.local_addr, "listener socket shut down");
        }

        let mut wake_addr = self.local_addr;
        if wake_addr.ip().is_unspecified() {
            wake_addr.set_ip(match wake_addr {
                SocketAddr::V4(_) => std::net::Ipv4Addr::LOCALHOST.into(),
                SocketAddr::V6(_) => std::net::Ipv6Addr::LOCALHOST.into(),
            });
        }
        if let Ok(stream) = TcpStream::connect_timeout(&wake_addr, WAKE_TIMEOUT) {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        info!(addr = %self.local_addr, "listener closed");
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("local_addr", &self.local_addr)
            .finish()
    }
}
