#![cfg(feature = "cli")]

use std::io;
use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use msgserve_frame::FrameConfig;
use msgserve_server::{ChannelHandler, MessageClient, MessageServer, ServerConfig, ServerEvent};

const WAIT: Duration = Duration::from_secs(5);

fn free_port() -> u16 {
    TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .expect("free port should be available")
}

fn spawn_serve(port: u16, extra: &[&str]) -> Child {
    Command::new(env!("CARGO_BIN_EXE_msgserve"))
        .args(["--log-level", "error", "--format", "json", "serve"])
        .arg(port.to_string())
        .args(["--bind", "127.0.0.1"])
        .args(extra)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("serve command should start")
}

fn wait_for_connect(addr: SocketAddr, timeout: Duration) -> io::Result<MessageClient> {
    let start = Instant::now();
    loop {
        match MessageClient::connect(addr, FrameConfig::default()) {
            Ok(client) => return Ok(client),
            Err(err) => {
                if start.elapsed() >= timeout {
                    return Err(io::Error::other(format!("connect timeout: {err}")));
                }
                thread::sleep(Duration::from_millis(25));
            }
        }
    }
}

fn wait_for_exit(child: &mut Child, timeout: Duration) -> Option<ExitStatus> {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if let Ok(Some(status)) = child.try_wait() {
            return Some(status);
        }
        thread::sleep(Duration::from_millis(25));
    }
    let _ = child.kill();
    let _ = child.wait();
    None
}

#[test]
fn serve_echo_returns_messages() {
    let port = free_port();
    let mut child = spawn_serve(port, &["--echo"]);

    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let mut client = wait_for_connect(addr, Duration::from_secs(3)).expect("client should connect");
    client.set_read_timeout(Some(WAIT)).unwrap();

    client.send(b"hello").unwrap();
    assert_eq!(client.recv().unwrap().unwrap().as_ref(), b"hello");
    client.send(b"again").unwrap();
    assert_eq!(client.recv().unwrap().unwrap().as_ref(), b"again");

    let _ = child.kill();
    let _ = child.wait();
}

#[test]
fn serve_count_prints_json_events_and_exits() {
    let port = free_port();
    let mut child = spawn_serve(port, &["--count", "1"]);

    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let mut client = wait_for_connect(addr, Duration::from_secs(3)).expect("client should connect");
    client.send(b"{\"n\":1}").unwrap();

    let status = wait_for_exit(&mut child, WAIT).expect("serve should exit after one message");
    assert!(status.success());

    let output = child.wait_with_output().expect("stdout should be readable");
    let events: Vec<serde_json::Value> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be json"))
        .collect();

    let received = events
        .iter()
        .find(|event| event["event"] == "received")
        .expect("received event should be printed");
    assert_eq!(received["payload"], "{\"n\":1}");
    assert_eq!(received["payload_size"], 7);
    assert_eq!(events[0]["event"], "connected");
    assert_eq!(events[0]["connection_id"], received["connection_id"]);
}

#[test]
fn send_wait_prints_reply() {
    let (handler, events) = ChannelHandler::new();
    let config = ServerConfig::default().with_bind_host(Ipv4Addr::LOCALHOST.into());
    let server = std::sync::Arc::new(MessageServer::new(config, handler));
    let addr = server.start(0, None).unwrap();

    let echo = {
        let server = std::sync::Arc::clone(&server);
        thread::spawn(move || {
            while let Ok(event) = events.recv_timeout(WAIT) {
                match event {
                    ServerEvent::Received(id, payload) => server.send(id, payload),
                    ServerEvent::Disconnected(_) => break,
                    _ => {}
                }
            }
        })
    };

    let output = Command::new(env!("CARGO_BIN_EXE_msgserve"))
        .args(["--log-level", "error", "--format", "raw", "send"])
        .arg(addr.to_string())
        .args(["--data", "round trip", "--wait", "--wait-timeout", "3s"])
        .output()
        .expect("send command should run");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(output.stdout, b"round trip");
    echo.join().unwrap();
}

#[test]
fn send_to_closed_port_fails() {
    let port = free_port();
    let output = Command::new(env!("CARGO_BIN_EXE_msgserve"))
        .args(["--log-level", "error", "send"])
        .arg(format!("127.0.0.1:{port}"))
        .args(["--data", "nobody home"])
        .output()
        .expect("send command should run");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("connect failed"));
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_msgserve"))
        .arg("version")
        .output()
        .expect("version command should run");

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("msgserve {}", env!("CARGO_PKG_VERSION"))
    );
}
