use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: payload length (4 bytes, little-endian).
pub const HEADER_SIZE: usize = 4;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Largest payload the header can describe.
const WIRE_MAX_PAYLOAD: usize = u32::MAX as usize;

/// Encode one message into the wire format.
///
/// Wire format:
/// ```text
/// ┌─────────────┬──────────────────┐
/// │ Length      │ Payload          │
/// │ (4B LE)     │ (Length bytes)   │
/// └─────────────┴──────────────────┘
/// ```
///
/// Nothing is appended to `dst` when the payload is rejected.
pub fn encode_frame(payload: &[u8], max_payload: usize, dst: &mut BytesMut) -> Result<()> {
    let max = max_payload.min(WIRE_MAX_PAYLOAD);
    if payload.len() > max {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u32_le(payload.len() as u32);
    dst.put_slice(payload);
    Ok(())
}

/// Decode one message from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer. The declared length
/// is checked against `max_payload` as soon as the header is available, so an
/// oversize frame is rejected before any of its payload is buffered.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Bytes>> {
    if src.len() < HEADER_SIZE {
        return Ok(None); // Need more data
    }

    let mut header = [0u8; HEADER_SIZE];
    header.copy_from_slice(&src[..HEADER_SIZE]);
    let payload_len = u32::from_le_bytes(header) as usize;

    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + payload_len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None); // Need more data
    }

    src.advance(HEADER_SIZE);
    Ok(Some(src.split_to(payload_len).freeze()))
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

impl FrameConfig {
    /// Config with an explicit payload ceiling and no timeouts.
    pub fn with_max_payload(max_payload_size: usize) -> Self {
        Self {
            max_payload_size,
            ..Self::default()
        }
    }
}
