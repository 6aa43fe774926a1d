use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use msgserve_transport::TcpTransport;
use tracing::{debug, info, trace, warn};

use crate::accept::{AcceptLoop, ActiveListener, ListenerSlot};
use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::event::ServerHandler;
use crate::id::{ConnectionId, IdAllocator};
use crate::registry::{lock, ConnectionRegistry};

/// TCP message server.
///
/// Stopped until [`MessageServer::start`] binds a listener; active until
/// [`MessageServer::stop`] or a fatal listener error. Every method takes
/// `&self` and is safe to call from any thread, including from inside
/// handler callbacks.
pub struct MessageServer {
    config: ServerConfig,
    registry: Arc<ConnectionRegistry>,
    handler: Arc<dyn ServerHandler>,
    listener: ListenerSlot,
}

impl MessageServer {
    pub fn new(config: ServerConfig, handler: impl ServerHandler) -> Self {
        Self::with_handler(config, Arc::new(handler))
    }

    /// Server sharing an existing handler.
    pub fn with_handler(config: ServerConfig, handler: Arc<dyn ServerHandler>) -> Self {
        Self::with_id_allocator(config, handler, IdAllocator::new())
    }

    /// Server drawing connection ids from `ids`.
    pub fn with_id_allocator(
        config: ServerConfig,
        handler: Arc<dyn ServerHandler>,
        ids: IdAllocator,
    ) -> Self {
        Self {
            config,
            registry: Arc::new(ConnectionRegistry::with_ids(ids)),
            handler,
            listener: Arc::new(Mutex::new(None)),
        }
    }

    /// Bind to `port` on the configured host and begin accepting.
    ///
    /// `max_connections` overrides [`ServerConfig::max_connections`] when
    /// `Some`. Returns the bound address (useful with port 0). Calling this
    /// while active reports [`ServerError::AlreadyActive`] to the handler
    /// under [`ConnectionId::SERVER`] and returns it.
    pub fn start(&self, port: u16, max_connections: Option<usize>) -> Result<SocketAddr> {
        let mut slot = lock(&self.listener);
        if slot.is_some() {
            drop(slot);
            self.handler
                .on_received_error(ConnectionId::SERVER, ServerError::AlreadyActive);
            return Err(ServerError::AlreadyActive);
        }

        let transport = TcpTransport::bind(SocketAddr::new(self.config.bind_host, port))?;
        let local_addr = transport.local_addr();
        let closer = transport.closer()?;
        let stopping = Arc::new(AtomicBool::new(false));
        let max_connections = max_connections.or(self.config.max_connections);

        let accept = AcceptLoop {
            transport,
            stopping: Arc::clone(&stopping),
            max_connections,
            no_delay: self.config.no_delay,
            frame_config: self.config.frame_config(),
            registry: Arc::clone(&self.registry),
            handler: Arc::clone(&self.handler),
            listener: Arc::clone(&self.listener),
        };
        let thread = accept.spawn()?;

        *slot = Some(ActiveListener {
            local_addr,
            stopping,
            closer,
            thread: Some(thread),
        });
        info!(%local_addr, ?max_connections, "server started");
        Ok(local_addr)
    }

    /// Close the listener and every live connection. No-op when stopped.
    ///
    /// Each closed connection's receive loop still delivers its own
    /// `on_disconnected`, asynchronously.
    pub fn stop(&self) {
        let Some(mut active) = lock(&self.listener).take() else {
            return;
        };

        active.stopping.store(true, Ordering::SeqCst);
        active.closer.close();
        if let Some(handle) = active.thread.take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }

        let connections = self.registry.drain();
        let count = connections.len();
        for connection in connections {
            connection.close();
        }
        info!(local_addr = %active.local_addr, closed = count, "server stopped");
    }

    /// Send one message to a connection.
    ///
    /// Blocks only until the frame is written locally. Failures never return
    /// to the caller; they reach the handler:
    /// - unknown id: `on_received_error(id, NotConnected)` right away
    /// - connection closed locally: nothing (its receive loop reports the close)
    /// - any other write failure: the connection is torn down and its receive
    ///   loop reports the error once, however many sends failed together
    pub fn send(&self, id: ConnectionId, payload: impl AsRef<[u8]>) {
        let Some(connection) = self.registry.get(id) else {
            debug!(%id, "send to unknown connection");
            self.handler
                .on_received_error(id, ServerError::NotConnected(id));
            return;
        };

        match connection.write_frame(payload.as_ref()) {
            Ok(()) => trace!(%id, size = payload.as_ref().len(), "frame sent"),
            Err(ServerError::StreamClosed) => {
                debug!(%id, "send on closed stream");
                self.disconnect(id);
            }
            Err(err) => self.fail_connection(id, err),
        }
    }

    /// Tear a connection down after a write failure. Only the first failure
    /// per connection is kept for reporting.
    fn fail_connection(&self, id: ConnectionId, err: ServerError) {
        match self.registry.remove_faulted(id, err) {
            Some(connection) => {
                warn!(%id, "send failed; disconnecting");
                connection.close();
            }
            None => debug!(%id, "send failed on connection already being torn down"),
        }
    }

    /// Remove a connection and close its socket. Returns whether it was live.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        match self.registry.remove(id) {
            Some(connection) => {
                debug!(%id, "disconnecting");
                connection.close();
                true
            }
            None => false,
        }
    }

    /// Remote address of a live connection.
    pub fn remote_address(&self, id: ConnectionId) -> Option<SocketAddr> {
        self.registry.get(id).map(|connection| connection.peer_addr())
    }

    pub fn is_active(&self) -> bool {
        lock(&self.listener).is_some()
    }

    /// Address the listener is bound to, while active.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        lock(&self.listener).as_ref().map(|active| active.local_addr)
    }

    /// Reserve a connection id. Works before any connection exists; the id
    /// is consumed and will not be handed to an accepted connection.
    pub fn next_connection_id(&self) -> Result<ConnectionId> {
        self.registry.allocate_id()
    }

    pub fn connection_count(&self) -> usize {
        self.registry.count()
    }

    /// Ids of live connections, ascending.
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.registry.ids()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl Drop for MessageServer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for MessageServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageServer")
            .field("local_addr", &self.local_addr())
            .field("connections", &self.connection_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::mpsc::Receiver;
    use std::sync::Barrier;
    use std::time::Duration;

    use crate::client::MessageClient;
    use crate::error::ErrorKind;
    use crate::event::{ChannelHandler, ServerEvent};

    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    fn loopback_server() -> (Arc<MessageServer>, Receiver<ServerEvent>, SocketAddr) {
        let (handler, events) = ChannelHandler::new();
        let config = ServerConfig::default().with_bind_host(IpAddr::V4(Ipv4Addr::LOCALHOST));
        let server = Arc::new(MessageServer::new(config, handler));
        let addr = server.start(0, None).unwrap();
        (server, events, addr)
    }

    fn next(events: &Receiver<ServerEvent>) -> ServerEvent {
        events.recv_timeout(WAIT).expect("event should arrive")
    }

    #[test]
    fn concurrent_write_failures_report_once() {
        let (server, events, addr) = loopback_server();
        let _client = MessageClient::connect(addr, Default::default()).unwrap();
        let id = match next(&events) {
            ServerEvent::Connected(id) => id,
            other => panic!("expected connected, got {other:?}"),
        };

        let senders = 16;
        let barrier = Arc::new(Barrier::new(senders));
        let handles: Vec<_> = (0..senders)
            .map(|_| {
                let server = Arc::clone(&server);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let err = std::io::Error::from(std::io::ErrorKind::ConnectionReset);
                    server.fail_connection(id, err.into());
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(matches!(
            next(&events),
            ServerEvent::ReceivedError(got, ServerError::Transport(_)) if got == id
        ));
        assert!(matches!(next(&events), ServerEvent::Disconnected(got) if got == id));
        assert!(events.recv_timeout(Duration::from_millis(200)).is_err());
        assert_eq!(server.connection_count(), 0);
    }

    #[test]
    fn concurrent_sends_to_reset_peer_report_once() {
        let (server, events, addr) = loopback_server();
        // Never reads, so the server's writes back up in the socket buffers.
        let peer = TcpTransport::connect(addr).unwrap();
        let id = match next(&events) {
            ServerEvent::Connected(id) => id,
            other => panic!("expected connected, got {other:?}"),
        };

        let senders = 16;
        let payload = Arc::new(vec![0u8; 4 * 1024 * 1024]);
        let barrier = Arc::new(Barrier::new(senders + 1));
        let handles: Vec<_> = (0..senders)
            .map(|_| {
                let server = Arc::clone(&server);
                let payload = Arc::clone(&payload);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    server.send(id, payload.as_slice());
                })
            })
            .collect();

        barrier.wait();
        thread::sleep(Duration::from_millis(100));
        // Closing with unread data queued makes the kernel reset the connection.
        drop(peer);
        for handle in handles {
            handle.join().unwrap();
        }

        let mut errors = 0;
        loop {
            match next(&events) {
                ServerEvent::ReceivedError(got, err) => {
                    assert_eq!(got, id);
                    assert_eq!(err.kind(), ErrorKind::TransportFault);
                    errors += 1;
                }
                ServerEvent::Disconnected(got) => {
                    assert_eq!(got, id);
                    break;
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(errors, 1);
        assert!(events.recv_timeout(Duration::from_millis(200)).is_err());
        assert_eq!(server.connection_count(), 0);
    }

    #[test]
    fn no_delay_setting_reaches_accepted_sockets() {
        for no_delay in [true, false] {
            let (handler, events) = ChannelHandler::new();
            let config = ServerConfig::default()
                .with_bind_host(IpAddr::V4(Ipv4Addr::LOCALHOST))
                .with_no_delay(no_delay);
            let server = MessageServer::new(config, handler);
            let addr = server.start(0, None).unwrap();

            let _client = MessageClient::connect(addr, Default::default()).unwrap();
            let id = match next(&events) {
                ServerEvent::Connected(id) => id,
                other => panic!("expected connected, got {other:?}"),
            };
            let connection = server.registry.get(id).unwrap();
            assert_eq!(connection.no_delay().unwrap(), no_delay);
        }
    }

    #[test]
    fn oversize_send_tears_connection_down() {
        let (handler, events) = ChannelHandler::new();
        let config = ServerConfig::default()
            .with_bind_host(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .with_max_payload_size(8);
        let server = MessageServer::new(config, handler);
        let addr = server.start(0, None).unwrap();

        let _client = MessageClient::connect(addr, Default::default()).unwrap();
        let id = match next(&events) {
            ServerEvent::Connected(id) => id,
            other => panic!("expected connected, got {other:?}"),
        };

        server.send(id, [0u8; 9]);
        assert!(matches!(
            next(&events),
            ServerEvent::ReceivedError(_, ServerError::FrameTooLarge { size: 9, max: 8 })
        ));
        assert!(matches!(next(&events), ServerEvent::Disconnected(got) if got == id));
    }

    #[test]
    fn reserved_ids_are_skipped_by_connections() {
        let (server, events, addr) = loopback_server();
        let reserved = server.next_connection_id().unwrap();
        assert_eq!(reserved.raw(), 1);

        let _client = MessageClient::connect(addr, Default::default()).unwrap();
        assert!(matches!(next(&events), ServerEvent::Connected(id) if id.raw() == 2));
    }

    #[test]
    fn exhausted_ids_stop_accepting() {
        let (handler, events) = ChannelHandler::new();
        let config = ServerConfig::default().with_bind_host(IpAddr::V4(Ipv4Addr::LOCALHOST));
        let server = MessageServer::with_id_allocator(
            config,
            Arc::new(handler),
            IdAllocator::starting_at(u64::MAX),
        );
        let addr = server.start(0, None).unwrap();

        let _client = MessageClient::connect(addr, Default::default()).unwrap();
        assert!(matches!(
            next(&events),
            ServerEvent::ReceivedError(id, ServerError::IdSpaceExhausted) if id.is_server()
        ));
        assert!(!server.is_active());
    }
}
