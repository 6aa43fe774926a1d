use msgserve_frame::FrameError;
use msgserve_transport::TransportError;

use crate::id::ConnectionId;

/// Errors reported by the server, either through
/// [`ServerHandler::on_received_error`](crate::ServerHandler::on_received_error)
/// or as a return value.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// `start` was called while the server was already listening.
    #[error("server is already active")]
    AlreadyActive,

    /// No live connection has this id.
    #[error("connection {0} is not connected")]
    NotConnected(ConnectionId),

    /// The connection was closed locally before or during the operation.
    #[error("stream already closed")]
    StreamClosed,

    /// A frame exceeded the configured payload ceiling.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error other than an oversize frame.
    #[error("frame error: {0}")]
    Frame(FrameError),

    /// The connection id counter cannot advance any further.
    #[error("connection id space exhausted")]
    IdSpaceExhausted,
}

impl From<FrameError> for ServerError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::PayloadTooLarge { size, max } => ServerError::FrameTooLarge { size, max },
            other => ServerError::Frame(other),
        }
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Transport(TransportError::Io(err))
    }
}

/// Coarse classification of a [`ServerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AlreadyActive,
    NotConnected,
    StreamClosed,
    FrameTooLarge,
    /// Any other I/O or framing failure on a live connection or the listener.
    TransportFault,
    IdSpaceExhausted,
}

impl ServerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServerError::AlreadyActive => ErrorKind::AlreadyActive,
            ServerError::NotConnected(_) => ErrorKind::NotConnected,
            ServerError::StreamClosed => ErrorKind::StreamClosed,
            ServerError::FrameTooLarge { .. } => ErrorKind::FrameTooLarge,
            ServerError::Transport(_) | ServerError::Frame(_) => ErrorKind::TransportFault,
            ServerError::IdSpaceExhausted => ErrorKind::IdSpaceExhausted,
        }
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversize_frame_error_maps_to_frame_too_large() {
        let err = ServerError::from(FrameError::PayloadTooLarge { size: 9, max: 8 });
        assert!(matches!(err, ServerError::FrameTooLarge { size: 9, max: 8 }));
        assert_eq!(err.kind(), ErrorKind::FrameTooLarge);
    }

    #[test]
    fn truncation_is_a_transport_fault() {
        let err = ServerError::from(FrameError::Truncated { buffered: 3 });
        assert_eq!(err.kind(), ErrorKind::TransportFault);
    }

    #[test]
    fn io_errors_are_transport_faults() {
        let err = ServerError::from(std::io::Error::from(std::io::ErrorKind::ConnectionReset));
        assert_eq!(err.kind(), ErrorKind::TransportFault);
        assert!(err.to_string().starts_with("transport error"));
    }
}
