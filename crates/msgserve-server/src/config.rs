use std::net::{IpAddr, Ipv4Addr};

use msgserve_frame::{FrameConfig, DEFAULT_MAX_PAYLOAD};

/// Server behavior configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface the listener binds to. Default: `0.0.0.0`.
    pub bind_host: IpAddr,
    /// Frame payload ceiling, enforced on receive and send. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Set `TCP_NODELAY` on accepted connections. Default: `true`.
    pub no_delay: bool,
    /// Admission ceiling used when `start` is not given one. Default: unbounded.
    pub max_connections: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            no_delay: true,
            max_connections: None,
        }
    }
}

impl ServerConfig {
    pub fn with_bind_host(mut self, host: IpAddr) -> Self {
        self.bind_host = host;
        self
    }

    pub fn with_max_payload_size(mut self, max_payload_size: usize) -> Self {
        self.max_payload_size = max_payload_size;
        self
    }

    pub fn with_no_delay(mut self, no_delay: bool) -> Self {
        self.no_delay = no_delay;
        self
    }

    pub fn with_max_connections(mut self, max_connections: Option<usize>) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub(crate) fn frame_config(&self) -> FrameConfig {
        FrameConfig::with_max_payload(self.max_payload_size)
    }
}
