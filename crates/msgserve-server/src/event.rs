use std::sync::mpsc::{self, Receiver, Sender};

use bytes::Bytes;

use crate::error::ServerError;
use crate::id::ConnectionId;

/// Consumer of server events.
///
/// Callbacks run on whichever server thread produced the event: connection
/// events on that connection's receive loop, listener faults on the accept
/// loop, `NotConnected` on the thread that called `send`. Implementations
/// must therefore be thread-safe and should return promptly, since a slow
/// `on_received` stalls reading for that connection.
pub trait ServerHandler: Send + Sync + 'static {
    fn on_connected(&self, _id: ConnectionId) {}

    fn on_received(&self, _id: ConnectionId, _payload: Bytes) {}

    fn on_disconnected(&self, _id: ConnectionId) {}

    /// `id` is [`ConnectionId::SERVER`] for listener-level failures.
    fn on_received_error(&self, _id: ConnectionId, _error: ServerError) {}
}

/// One server event, as delivered by [`ChannelHandler`].
#[derive(Debug)]
pub enum ServerEvent {
    Connected(ConnectionId),
    Received(ConnectionId, Bytes),
    Disconnected(ConnectionId),
    ReceivedError(ConnectionId, ServerError),
}

impl ServerEvent {
    pub fn connection_id(&self) -> ConnectionId {
        match self {
            ServerEvent::Connected(id)
            | ServerEvent::Received(id, _)
            | ServerEvent::Disconnected(id)
            | ServerEvent::ReceivedError(id, _) => *id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected(_) => "connected",
            ServerEvent::Received(..) => "received",
            ServerEvent::Disconnected(_) => "disconnected",
            ServerEvent::ReceivedError(..) => "error",
        }
    }
}

/// Forwards every event into an mpsc channel, for consumers that prefer a
/// single dispatch loop over callbacks.
///
/// Per-connection ordering is preserved because each connection's events are
/// sent from one thread. Events are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    tx: Sender<ServerEvent>,
}

impl ChannelHandler {
    pub fn new() -> (Self, Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }

    fn emit(&self, event: ServerEvent) {
        let _ = self.tx.send(event);
    }
}

impl ServerHandler for ChannelHandler {
    fn on_connected(&self, id: ConnectionId) {
        self.emit(ServerEvent::Connected(id));
    }

    fn on_received(&self, id: ConnectionId, payload: Bytes) {
        self.emit(ServerEvent::Received(id, payload));
    }

    fn on_disconnected(&self, id: ConnectionId) {
        self.emit(ServerEvent::Disconnected(id));
    }

    fn on_received_error(&self, id: ConnectionId, error: ServerError) {
        self.emit(ServerEvent::ReceivedError(id, error));
    }
}
