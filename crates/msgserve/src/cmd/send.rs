use std::fs;
use std::time::Duration;

use bytes::Bytes;
use msgserve_frame::FrameConfig;
use msgserve_server::{MessageClient, Result as ServerResult};

use crate::cmd::SendArgs;
use crate::exit::{io_error, server_error, CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{print_reply, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let payload = resolve_payload(&args)?;

    let config = FrameConfig::with_max_payload(args.max_payload);
    let mut client = MessageClient::connect(args.addr.as_str(), config)
        .map_err(|err| server_error("connect failed", err))?;

    client
        .send(&payload)
        .map_err(|err| server_error("send failed", err))?;
    tracing::debug!(addr = %client.peer_addr(), size = payload.len(), "message sent");

    if args.wait {
        client
            .set_read_timeout(Some(wait_timeout))
            .map_err(|err| server_error("set timeout failed", err))?;
        let reply = wait_for_reply(&mut client)?;
        print_reply(&reply, client.peer_addr(), format);
    }

    let _ = client.shutdown();
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(json) = &args.json {
        serde_json::from_str::<serde_json::Value>(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        return Ok(json.as_bytes().to_vec());
    }
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Vec::new())
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

trait ReplySource {
    fn next_reply(&mut self) -> ServerResult<Option<Bytes>>;
}

impl ReplySource for MessageClient {
    fn next_reply(&mut self) -> ServerResult<Option<Bytes>> {
        self.recv()
    }
}

fn wait_for_reply<R: ReplySource>(source: &mut R) -> CliResult<Bytes> {
    match source.next_reply() {
        Ok(Some(reply)) => Ok(reply),
        Ok(None) => Err(CliError::new(
            FAILURE,
            "receive failed: server closed the connection without replying",
        )),
        Err(err) => Err(server_error("receive failed", err)),
    }
}
