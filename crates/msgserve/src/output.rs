use std::io::{IsTerminal, Write};
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use msgserve_server::ServerEvent;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct EventOutput<'a> {
    event: &'a str,
    connection_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    peer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    timestamp: String,
}

impl<'a> EventOutput<'a> {
    fn new(event: &'a ServerEvent, peer: Option<SocketAddr>) -> Self {
        let (payload_size, payload, error) = match event {
            ServerEvent::Received(_, payload) => {
                (Some(payload.len()), Some(payload_preview(payload)), None)
            }
            ServerEvent::ReceivedError(_, err) => (None, None, Some(err.to_string())),
            ServerEvent::Connected(_) | ServerEvent::Disconnected(_) => (None, None, None),
        };
        Self {
            event: event.name(),
            connection_id: event.connection_id().raw(),
            peer: peer.map(|addr| addr.to_string()),
            payload_size,
            payload,
            error,
            timestamp: now_unix_seconds(),
        }
    }

    fn detail(&self) -> String {
        match (&self.payload, &self.error) {
            (Some(payload), _) => payload.clone(),
            (None, Some(error)) => error.clone(),
            (None, None) => String::new(),
        }
    }
}

/// Print one server event. Raw output carries received payloads only.
pub fn print_event(event: &ServerEvent, peer: Option<SocketAddr>, format: OutputFormat) {
    if let OutputFormat::Raw = format {
        if let ServerEvent::Received(_, payload) = event {
            print_raw(payload);
        }
        return;
    }

    let out = EventOutput::new(event, peer);
    let peer = out.peer.as_deref().unwrap_or("-");
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["EVENT", "CONNECTION", "PEER", "SIZE", "DETAIL"])
                .add_row(vec![
                    out.event.to_uppercase(),
                    out.connection_id.to_string(),
                    peer.to_string(),
                    out.payload_size
                        .map(|size| size.to_string())
                        .unwrap_or_default(),
                    out.detail(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let mut line = format!("{} id={} peer={}", out.event, out.connection_id, peer);
            if let Some(size) = out.payload_size {
                line.push_str(&format!(" size={size}"));
            }
            let detail = out.detail();
            if !detail.is_empty() {
                line.push_str(&format!(" detail={detail}"));
            }
            println!("{line}");
        }
        OutputFormat::Raw => {}
    }
}

#[derive(Serialize)]
struct ReplyOutput {
    peer: String,
    payload_size: usize,
    payload: String,
    timestamp: String,
}

/// Print the reply to a `send --wait`.
pub fn print_reply(payload: &[u8], peer: SocketAddr, format: OutputFormat) {
    let out = ReplyOutput {
        peer: peer.to_string(),
        payload_size: payload.len(),
        payload: payload_preview(payload),
        timestamp: now_unix_seconds(),
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PEER", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    out.peer.clone(),
                    out.payload_size.to_string(),
                    out.payload.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "reply peer={} size={} payload={}",
                out.peer, out.payload_size, out.payload
            );
        }
        OutputFormat::Raw => print_raw(payload),
    }
}

fn print_json(value: &impl Serialize) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use msgserve_server::{ConnectionId, ServerError};

    use super::*;

    #[test]
    fn received_event_serializes_payload_fields() {
        let event = ServerEvent::Received(ConnectionId::from_raw(4), Bytes::from_static(b"hi"));
        let peer: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let value = serde_json::to_value(EventOutput::new(&event, Some(peer))).unwrap();

        assert_eq!(value["event"], "received");
        assert_eq!(value["connection_id"], 4);
        assert_eq!(value["peer"], "127.0.0.1:9000");
        assert_eq!(value["payload_size"], 2);
        assert_eq!(value["payload"], "hi");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn error_event_carries_message() {
        let event = ServerEvent::ReceivedError(ConnectionId::SERVER, ServerError::AlreadyActive);
        let value = serde_json::to_value(EventOutput::new(&event, None)).unwrap();

        assert_eq!(value["event"], "error");
        assert_eq!(value["connection_id"], 0);
        assert_eq!(value["error"], "server is already active");
        assert!(value.get("peer").is_none());
    }

    #[test]
    fn binary_payloads_are_summarized() {
        assert_eq!(payload_preview(&[0xff, 0xfe]), "<binary 2 bytes>");
        assert_eq!(payload_preview(b"text"), "text");
    }
}
