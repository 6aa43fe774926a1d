//! TCP transport adapters.
//!
//! This is the lowest layer of msgserve. It wraps the standard library's
//! blocking TCP types with the few operations the server needs on top:
//! - binding a listener that can be woken from another thread ([`ListenerCloser`])
//! - a connected stream ([`NetStream`]) that can be closed locally while a
//!   reader is blocked on it

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::NetStream;
pub use tcp::{ListenerCloser, TcpTransport};
