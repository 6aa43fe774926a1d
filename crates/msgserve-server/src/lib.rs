//! Connection-oriented framed message server.
//!
//! [`MessageServer`] accepts TCP connections, gives each one a process-unique
//! [`ConnectionId`], and runs one receive loop thread per connection that turns
//! the byte stream into whole messages. Lifecycle and data events reach the
//! consumer through a [`ServerHandler`].
//!
//! For every connection the handler observes
//! `on_connected`, zero or more `on_received`, at most one `on_received_error`,
//! then exactly one `on_disconnected`, all from that connection's own thread.
//! Events for different connections are not ordered relative to each other.

mod accept;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod id;
mod receive;
pub mod registry;
pub mod server;

pub use client::MessageClient;
pub use config::ServerConfig;
pub use error::{ErrorKind, Result, ServerError};
pub use event::{ChannelHandler, ServerEvent, ServerHandler};
pub use id::{ConnectionId, IdAllocator};
pub use registry::ConnectionRegistry;
pub use server::MessageServer;
