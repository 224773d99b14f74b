#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use assert_cmd::Command;
use serde_json::Value;

const ENV_KEYS: &[&str] = &[
    "AIAGENTS_MODEL",
    "AIAGENTS_BASE_URL",
    "AIAGENTS_SYSTEM",
    "AIAGENTS_TEMPERATURE",
    "AIAGENTS_MAX_TOKENS",
    "AIAGENTS_TIMEOUT",
    "AIAGENTS_RETRIES",
    "AIAGENTS_RETRY_DELAY",
    "AIAGENTS_OUTPUT",
    "OPENAI_API_KEY",
    "RUST_LOG",
];

pub fn aiagents_cmd(config: &Path) -> Command {
    isolated(Command::new(assert_cmd::cargo::cargo_bin!("aiagents")), config)
}

pub fn agent_chat_cmd(config: &Path) -> Command {
    isolated(Command::new(assert_cmd::cargo::cargo_bin!("agent-chat")), config)
}

/// Clears inherited settings and points the config at `config`.
fn isolated(mut cmd: Command, config: &Path) -> Command {
    for key in ENV_KEYS {
        cmd.env_remove(key);
    }
    cmd.env("AIAGENTS_CONFIG", config);
    cmd
}

pub fn parse_stdout_json(output: &[u8]) -> Value {
    let text = String::from_utf8(output.to_vec()).expect("stdout should be utf-8");
    serde_json::from_str(text.trim()).expect("stdout should contain valid JSON")
}

/// HTTP stub standing in for a chat-completions server. Each scripted reply
/// answers one connection, in order.
pub struct StubServer {
    pub base_url: String,
    requests: Receiver<Value>,
}

impl StubServer {
    pub fn start(status: u16, body: Value) -> Self {
        Self::script(vec![(status, body.to_string())])
    }

    pub fn script(replies: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("stub should bind");
        let base_url = format!("http://{}/v1", listener.local_addr().unwrap());
        let (sender, requests) = mpsc::channel();

        thread::spawn(move || {
            for (status, payload) in replies {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                let request = read_request_body(&mut stream);
                let reason = if status == 200 { "OK" } else { "Error" };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
                    payload.len()
                );
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();
                let _ = sender.send(request);
            }
        });

        Self { base_url, requests }
    }

    /// JSON body of the next request the stub answered.
    pub fn received(&self) -> Value {
        self.requests
            .recv_timeout(Duration::from_secs(5))
            .expect("stub should have received a request")
    }
}

/// Base URL of a local port with nothing listening on it.
pub fn closed_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("port should bind");
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/v1")
}

fn read_request_body(stream: &mut impl Read) -> Value {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let read = stream.read(&mut chunk).unwrap_or(0);
        if read == 0 {
            return Value::Null;
        }
        buffer.extend_from_slice(&chunk[..read]);
        if let Some(pos) = buffer.windows(4).position(|window| window == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buffer[..header_end]).to_ascii_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buffer.len() < header_end + content_length {
        let read = stream.read(&mut chunk).unwrap_or(0);
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
    }

    serde_json::from_slice(&buffer[header_end..]).unwrap_or(Value::Null)
}
