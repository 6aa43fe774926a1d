//! Length-prefixed message framing.
//!
//! Every message on the wire is:
//! - A 4-byte little-endian payload length
//! - Exactly that many opaque payload bytes
//!
//! There is no magic number, version byte, or checksum; integrity relies on
//! the ordered byte stream TCP provides. A configurable payload ceiling
//! bounds what a peer can make us allocate.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

#[cfg(feature = "async")]
pub use async_codec::MessageCodec;
pub use codec::{decode_frame, encode_frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
