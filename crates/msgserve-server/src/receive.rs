use std::sync::Arc;
use std::thread::{self, JoinHandle};

use msgserve_frame::FrameReader;
use msgserve_transport::NetStream;
use tracing::{debug, trace, warn};

use crate::connection::FaultSlot;
use crate::error::ServerError;
use crate::event::ServerHandler;
use crate::id::ConnectionId;
use crate::registry::{lock, ConnectionRegistry};

/// Per-connection read loop: `Connecting -> Active -> Closed`.
///
/// Owns the read half of the stream for the connection's lifetime. The only
/// way to stop it is to close the socket, which makes the blocked read
/// return end-of-stream or fail.
pub(crate) struct ReceiveLoop {
    id: ConnectionId,
    reader: FrameReader<NetStream>,
    fault: FaultSlot,
    registry: Arc<ConnectionRegistry>,
    handler: Arc<dyn ServerHandler>,
}

impl ReceiveLoop {
    pub(crate) fn new(
        id: ConnectionId,
        reader: FrameReader<NetStream>,
        fault: FaultSlot,
        registry: Arc<ConnectionRegistry>,
        handler: Arc<dyn ServerHandler>,
    ) -> Self {
        Self {
            id,
            reader,
            fault,
            registry,
            handler,
        }
    }

    pub(crate) fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("msgserve-conn-{}", self.id))
            .spawn(move || self.run())
    }

    fn run(mut self) {
        debug!(
            id = %self.id,
            peer_addr = %self.reader.get_ref().peer_addr(),
            "connection active"
        );
        self.handler.on_connected(self.id);

        let outcome = loop {
            match self.reader.read_frame() {
                Ok(Some(payload)) => {
                    trace!(id = %self.id, size = payload.len(), "frame received");
                    self.handler.on_received(self.id, payload);
                }
                Ok(None) => break None,
                Err(err) => break Some(ServerError::from(err)),
            }
        };

        self.close(outcome);
    }

    /// Runs exactly once per connection, whatever ended the loop.
    fn close(self, outcome: Option<ServerError>) {
        let report = match self.registry.remove(self.id) {
            // Still registered: nobody else ended this connection, so a read
            // error is a genuine fault.
            Some(connection) => {
                connection.close();
                outcome
            }
            // Removed elsewhere. A failed send leaves its error in the fault
            // slot; a plain disconnect or stop leaves nothing, and whatever the
            // read returned is just the socket closing under us.
            None => {
                if let Some(err) = &outcome {
                    debug!(id = %self.id, error = %err, "read ended after local close");
                }
                lock(&self.fault).take()
            }
        };

        if let Err(err) = self.reader.get_ref().shutdown() {
            debug!(id = %self.id, error = %err, "socket shutdown failed");
        }

        if let Some(err) = report {
            warn!(id = %self.id, error = %err, "connection fault");
            self.handler.on_received_error(self.id, err);
        }

        debug!(id = %self.id, "connection closed");
        self.handler.on_disconnected(self.id);
    }
}
