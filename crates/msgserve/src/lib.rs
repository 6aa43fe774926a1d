//! Connection-oriented TCP message server.
//!
//! msgserve accepts many concurrent TCP clients, tags each with a unique
//! connection id, turns every byte stream into discrete length-prefixed
//! messages, and delivers connection lifecycle and data events to one handler.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP listener and stream plumbing
//! - [`frame`]: length-prefixed framing (`async` feature adds a tokio codec)
//! - [`server`]: the message server, its handler trait, and a blocking client

/// Re-export transport types.
pub mod transport {
    pub use msgserve_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use msgserve_frame::*;
}

/// Re-export server types.
pub mod server {
    pub use msgserve_server::*;
}

pub use msgserve_server::{
    ChannelHandler, ConnectionId, MessageClient, MessageServer, ServerConfig, ServerError,
    ServerEvent, ServerHandler,
};
