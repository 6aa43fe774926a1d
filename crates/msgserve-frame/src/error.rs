/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The stream ended partway through a frame.
    #[error("stream ended mid-frame ({buffered} bytes buffered)")]
    Truncated { buffered: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream stopped accepting bytes before a frame was fully written.
    #[error("connection closed (incomplete write)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
