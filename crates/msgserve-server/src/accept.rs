use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use msgserve_frame::FrameConfig;
use msgserve_transport::{ListenerCloser, NetStream, TcpTransport};
use tracing::{debug, error, info, warn};

use crate::connection::Connection;
use crate::error::{Result, ServerError};
use crate::event::ServerHandler;
use crate::id::ConnectionId;
use crate::receive::ReceiveLoop;
use crate::registry::{lock, ConnectionRegistry};

/// The bound listener and its accept thread. Present exactly while the
/// server is active.
pub(crate) struct ActiveListener {
    pub(crate) local_addr: SocketAddr,
    pub(crate) stopping: Arc<AtomicBool>,
    pub(crate) closer: ListenerCloser,
    pub(crate) thread: Option<JoinHandle<()>>,
}

pub(crate) type ListenerSlot = Arc<Mutex<Option<ActiveListener>>>;

/// Accepts connections until the listener is closed or fails.
pub(crate) struct AcceptLoop {
    pub(crate) transport: TcpTransport,
    pub(crate) stopping: Arc<AtomicBool>,
    pub(crate) max_connections: Option<usize>,
    pub(crate) no_delay: bool,
    pub(crate) frame_config: FrameConfig,
    pub(crate) registry: Arc<ConnectionRegistry>,
    pub(crate) handler: Arc<dyn ServerHandler>,
    pub(crate) listener: ListenerSlot,
}

impl AcceptLoop {
    pub(crate) fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("msgserve-accept-{}", self.transport.local_addr().port()))
            .spawn(move || self.run())
    }

    fn run(self) {
        let fault = loop {
            let accepted = self.transport.accept();

            // Anything accept returns after stop() began is the listener being
            // torn down, including the wake-up connection.
            if self.stopping.load(Ordering::SeqCst) {
                debug!("accept loop stopping");
                break None;
            }

            match accepted {
                Ok((stream, peer_addr)) => {
                    if let Err(err) = self.admit(stream, peer_addr) {
                        break Some(err);
                    }
                }
                Err(err) if is_transient(&err) => {
                    debug!(error = %err, "transient accept failure");
                }
                Err(err) => break Some(err.into()),
            }
        };

        self.release_listener();

        if let Some(err) = fault {
            error!(error = %err, "accept loop failed; no longer accepting connections");
            self.handler.on_received_error(ConnectionId::SERVER, err);
        }
    }

    /// Register one accepted stream and start its receive loop. Only
    /// listener-level faults are returned; a connection that fails to set up
    /// is reported and dropped without affecting the loop.
    fn admit(&self, stream: NetStream, peer_addr: SocketAddr) -> Result<()> {
        if let Some(limit) = self.max_connections {
            if self.registry.count() >= limit {
                info!(%peer_addr, limit, "connection limit reached; closing new connection");
                if let Err(err) = stream.shutdown() {
                    debug!(%peer_addr, error = %err, "rejected socket shutdown failed");
                }
                return Ok(());
            }
        }

        let id = self.registry.allocate_id()?;
        if let Err(err) = self.launch(id, stream) {
            self.setup_failed(id, peer_addr, err);
        }
        Ok(())
    }

    /// The connection never reached `on_connected`, so its failure belongs
    /// to the server, not to `id`.
    fn setup_failed(&self, id: ConnectionId, peer_addr: SocketAddr, err: ServerError) {
        warn!(%id, %peer_addr, error = %err, "connection setup failed");
        self.handler.on_received_error(ConnectionId::SERVER, err);
    }

    fn launch(&self, id: ConnectionId, stream: NetStream) -> Result<()> {
        stream.set_nodelay(self.no_delay)?;
        let (connection, reader) = Connection::open(id, stream, self.frame_config.clone())?;
        let connection = Arc::new(connection);
        self.registry.insert(Arc::clone(&connection));

        let receive = ReceiveLoop::new(
            id,
            reader,
            connection.fault_slot(),
            Arc::clone(&self.registry),
            Arc::clone(&self.handler),
        );
        if let Err(err) = receive.spawn() {
            self.registry.remove(id);
            connection.close();
            return Err(err.into());
        }
        Ok(())
    }

    /// Clear the listener slot if it still refers to this loop, leaving the
    /// server stopped.
    fn release_listener(&self) {
        let mut slot = lock(&self.listener);
        let ours = slot
            .as_ref()
            .is_some_and(|active| Arc::ptr_eq(&active.stopping, &self.stopping));
        if ours {
            slot.take();
        }
    }
}

/// Accept failures that belong to one half-open peer, not the listener.
fn is_transient(err: &msgserve_transport::TransportError) -> bool {
    matches!(
        err.io_kind(),
        ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset | ErrorKind::Interrupted
    )
}
