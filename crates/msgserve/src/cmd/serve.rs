use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::{Arc, Weak};
use std::time::Duration;

use msgserve_server::{ChannelHandler, MessageServer, ServerConfig, ServerEvent};

use crate::cmd::ServeArgs;
use crate::exit::{server_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_event, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = ServerConfig::default()
        .with_bind_host(args.bind)
        .with_max_payload_size(args.max_payload)
        .with_no_delay(args.no_delay)
        .with_max_connections(args.max_connections);

    let (handler, events) = ChannelHandler::new();
    let server = Arc::new(MessageServer::new(config, handler));
    let addr = server
        .start(args.port, None)
        .map_err(|err| server_error("start failed", err))?;
    tracing::info!(%addr, echo = args.echo, "serving");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone(), Arc::downgrade(&server))?;

    let mut received = 0usize;

    while running.load(Ordering::SeqCst) {
        let event = match events.recv_timeout(POLL_INTERVAL) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        print_event(&event, server.remote_address(event.connection_id()), format);

        match event {
            ServerEvent::Received(id, payload) => {
                if args.echo {
                    server.send(id, payload);
                }
                received = received.saturating_add(1);
                if args.count.is_some_and(|count| received >= count) {
                    break;
                }
            }
            ServerEvent::ReceivedError(id, err) if id.is_server() && !server.is_active() => {
                return Err(server_error("server stopped", err));
            }
            _ => {}
        }
    }

    server.stop();
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>, server: Weak<MessageServer>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
        if let Some(server) = server.upgrade() {
            server.stop();
        }
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
