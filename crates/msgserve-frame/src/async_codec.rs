use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_frame, DEFAULT_MAX_PAYLOAD};
use crate::error::{FrameError, Result};

/// `tokio_util` codec speaking the same wire format as
/// [`FrameReader`](crate::FrameReader) / [`FrameWriter`](crate::FrameWriter).
///
/// Lets async clients and tools talk to a msgserve server through
/// `Framed`, `FramedRead` or `FramedWrite`.
#[derive(Debug, Clone)]
pub struct MessageCodec {
    max_payload_size: usize,
}

impl MessageCodec {
    /// Codec with the default 16 MiB payload ceiling.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    /// Codec with an explicit payload ceiling, applied in both directions.
    pub fn with_max_payload(max_payload_size: usize) -> Self {
        Self { max_payload_size }
    }

    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for MessageCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        decode_frame(src, self.max_payload_size)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        match self.decode(src)? {
            Some(payload) => Ok(Some(payload)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::Truncated {
                buffered: src.len(),
            }),
        }
    }
}

impl Encoder<Bytes> for MessageCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        encode_frame(&item, self.max_payload_size, dst)
    }
}
