use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use msgserve_frame::DEFAULT_MAX_PAYLOAD;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a message server and print its events.
    Serve(ServeArgs),
    /// Send a single message.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// TCP port to listen on (0 picks a free port).
    pub port: u16,
    /// Send every received message back to its sender.
    #[arg(long)]
    pub echo: bool,
    /// Close new connections while this many are live.
    #[arg(long, env = "MSGSERVE_MAX_CONNECTIONS")]
    pub max_connections: Option<usize>,
    /// Largest accepted payload in bytes.
    #[arg(long, value_name = "BYTES", env = "MSGSERVE_MAX_PAYLOAD", default_value_t = DEFAULT_MAX_PAYLOAD)]
    pub max_payload: usize,
    /// Set TCP_NODELAY on accepted connections.
    #[arg(
        long,
        value_name = "BOOL",
        env = "MSGSERVE_NO_DELAY",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub no_delay: bool,
    /// Interface to bind.
    #[arg(long, value_name = "HOST", env = "MSGSERVE_BIND_HOST", default_value = "0.0.0.0")]
    pub bind: IpAddr,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Server address (host:port).
    pub addr: String,
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["json", "file"])]
    pub data: Option<String>,
    /// JSON payload, validated before sending.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub json: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["data", "json"])]
    pub file: Option<PathBuf>,
    /// Wait for one reply message and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
    /// Largest payload accepted in either direction.
    #[arg(long, value_name = "BYTES", env = "MSGSERVE_MAX_PAYLOAD", default_value_t = DEFAULT_MAX_PAYLOAD)]
    pub max_payload: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
