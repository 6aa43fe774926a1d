use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use msgserve_frame::{FrameConfig, FrameReader, FrameWriter};
use msgserve_transport::NetStream;
use tracing::debug;

use crate::error::{Result, ServerError};
use crate::id::ConnectionId;
use crate::registry::lock;

/// Error left behind by a failed send for the receive loop to report.
pub(crate) type FaultSlot = Arc<Mutex<Option<ServerError>>>;

/// Handle to one live connection, owned by the [`ConnectionRegistry`].
///
/// The handle carries the write half of the stream. The read half belongs to
/// the connection's receive loop, which never touches the handle directly;
/// the two share only the socket (so closing here ends the read there) and a
/// fault slot.
///
/// [`ConnectionRegistry`]: crate::ConnectionRegistry
pub struct Connection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    writer: Mutex<FrameWriter<NetStream>>,
    control: NetStream,
    closed: AtomicBool,
    fault: FaultSlot,
}

impl Connection {
    /// Split an accepted stream into a registry handle and the reader the
    /// receive loop will own.
    pub(crate) fn open(
        id: ConnectionId,
        stream: NetStream,
        config: FrameConfig,
    ) -> Result<(Self, FrameReader<NetStream>)> {
        let reader_stream = stream.try_clone()?;
        let control = stream.try_clone()?;
        let peer_addr = stream.peer_addr();

        let connection = Self {
            id,
            peer_addr,
            writer: Mutex::new(FrameWriter::with_config(stream, config.clone())),
            control,
            closed: AtomicBool::new(false),
            fault: Arc::new(Mutex::new(None)),
        };
        Ok((connection, FrameReader::with_config(reader_stream, config)))
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Whether `TCP_NODELAY` is set on the socket.
    pub fn no_delay(&self) -> Result<bool> {
        Ok(self.control.nodelay()?)
    }

    /// Whether [`Connection::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Write one frame. Frames from concurrent callers never interleave.
    ///
    /// Fails with [`ServerError::StreamClosed`] when the connection was closed
    /// locally before or while writing; any other failure is a transport fault.
    pub(crate) fn write_frame(&self, payload: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(ServerError::StreamClosed);
        }

        let mut writer = lock(&self.writer);
        match writer.send(payload) {
            Ok(()) => Ok(()),
            Err(_) if self.is_closed() => Err(ServerError::StreamClosed),
            Err(err) => Err(err.into()),
        }
    }

    /// Shut the socket down. Returns `false` if it was already closed.
    pub(crate) fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        if let Err(err) = self.control.shutdown() {
            debug!(id = %self.id, error = %err, "socket shutdown failed");
        }
        true
    }

    /// Keep the first fault recorded for this connection.
    pub(crate) fn record_fault(&self, err: ServerError) {
        let mut slot = lock(&self.fault);
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    pub(crate) fn fault_slot(&self) -> FaultSlot {
        Arc::clone(&self.fault)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use msgserve_transport::TcpTransport;

    use super::*;

    fn open_pair(max_payload: usize) -> (Connection, FrameReader<NetStream>, NetStream) {
        let listener = TcpTransport::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr();
        let client = thread::spawn(move || TcpTransport::connect(addr).unwrap());
        let (stream, _) = listener.accept().unwrap();
        let (conn, reader) = Connection::open(
            ConnectionId::from_raw(1),
            stream,
            FrameConfig::with_max_payload(max_payload),
        )
        .unwrap();
        (conn, reader, client.join().unwrap())
    }

    #[test]
    fn write_reaches_peer() {
        let (conn, _reader, client) = open_pair(64);
        conn.write_frame(b"hi").unwrap();

        let mut peer = FrameReader::new(client);
        assert_eq!(peer.read_frame().unwrap().unwrap().as_ref(), b"hi");
    }

    #[test]
    fn write_after_close_is_stream_closed() {
        let (conn, _reader, _client) = open_pair(64);
        assert!(conn.close());
        assert!(!conn.close(), "second close is a no-op");
        assert!(matches!(
            conn.write_frame(b"late"),
            Err(ServerError::StreamClosed)
        ));
    }

    #[test]
    fn close_ends_receive_side() {
        let (conn, mut reader, _client) = open_pair(64);
        conn.close();
        assert!(reader.read_frame().unwrap().is_none());
    }

    #[test]
    fn oversize_write_is_frame_too_large() {
        let (conn, _reader, _client) = open_pair(4);
        assert!(matches!(
            conn.write_frame(b"too long"),
            Err(ServerError::FrameTooLarge { size: 8, max: 4 })
        ));
    }

    #[test]
    fn first_fault_wins() {
        let (conn, _reader, _client) = open_pair(64);
        conn.record_fault(ServerError::FrameTooLarge { size: 9, max: 4 });
        conn.record_fault(ServerError::StreamClosed);

        let slot = conn.fault_slot();
        let recorded = slot.lock().unwrap().take();
        assert!(matches!(recorded, Some(ServerError::FrameTooLarge { .. })));
    }
}
