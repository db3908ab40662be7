//! Subprocess client for the tool server.
//!
//! Spawns the server binary, performs the `initialize` handshake and issues
//! tool calls over the child's stdin/stdout. Replies are read on a helper
//! thread so each call can give up after a timeout. The client never
//! retries; channel failures surface as [`ClientError`] and convert into
//! [`ToolError::TransportFailure`].

use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{ToolError, ToolResult};
use crate::protocol::{RpcRequest, RpcResponse, ToolCallResult, ToolDescriptor, PROTOCOL_VERSION};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("failed to start tool server {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("tool server closed the connection")]
    Closed,

    #[error("failed to send request: {0}")]
    Write(#[source] io::Error),

    #[error("failed to read reply: {0}")]
    Read(#[source] io::Error),

    #[error("undecodable reply from tool server: {0}")]
    Decode(String),

    #[error("no reply from tool server within {0:?}")]
    Timeout(Duration),

    #[error("tool server returned error {code}: {message}")]
    Rpc { code: i32, message: String },
}

impl From<ClientError> for ToolError {
    fn from(err: ClientError) -> Self {
        ToolError::TransportFailure(err.to_string())
    }
}

pub struct ToolClient {
    child: Child,
    stdin: Option<ChildStdin>,
    replies: Receiver<io::Result<String>>,
    next_id: u64,
    timeout: Duration,
    server_info: Value,
}

impl ToolClient {
    /// Starts `binary` with `args` and completes the handshake.
    pub fn spawn(binary: &Path, args: &[&str], timeout: Duration) -> Result<Self, ClientError> {
        let mut child = Command::new(binary)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| ClientError::Spawn {
                path: binary.to_path_buf(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(ClientError::Closed)?;
        let stdout = child.stdout.take().ok_or(ClientError::Closed)?;

        let (tx, replies) = mpsc::channel();
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let stop = line.is_err();
                if tx.send(line).is_err() || stop {
                    break;
                }
            }
        });

        let mut client = Self {
            child,
            stdin: Some(stdin),
            replies,
            next_id: 1,
            timeout,
            server_info: Value::Null,
        };
        let init = client.request(
            "initialize",
            Some(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {
                    "name": "gridmate-client",
                    "version": env!("CARGO_PKG_VERSION"),
                }
            })),
        )?;
        client.server_info = init.get("serverInfo").cloned().unwrap_or(Value::Null);
        client.notify("notifications/initialized")?;
        debug!(server = %client.server_info, "tool server ready");
        Ok(client)
    }

    /// `serverInfo` from the handshake.
    pub fn server_info(&self) -> &Value {
        &self.server_info
    }

    fn send(&mut self, request: &RpcRequest) -> Result<(), ClientError> {
        let stdin = self.stdin.as_mut().ok_or(ClientError::Closed)?;
        let mut line =
            serde_json::to_string(request).map_err(|e| ClientError::Decode(e.to_string()))?;
        line.push('\n');
        stdin
            .write_all(line.as_bytes())
            .and_then(|_| stdin.flush())
            .map_err(|e| match e.kind() {
                io::ErrorKind::BrokenPipe => ClientError::Closed,
                _ => ClientError::Write(e),
            })
    }

    fn notify(&mut self, method: &str) -> Result<(), ClientError> {
        self.send(&RpcRequest::new(method))
    }

    fn request(&mut self, method: &str, params: Option<Value>) -> Result<Value, ClientError> {
        let id = self.next_id;
        self.next_id += 1;
        let mut request = RpcRequest::new(method).with_id(id);
        if let Some(params) = params {
            request = request.with_params(params);
        }
        self.send(&request)?;

        loop {
            let line = match self.replies.recv_timeout(self.timeout) {
                Ok(Ok(line)) => line,
                Ok(Err(e)) => return Err(ClientError::Read(e)),
                Err(RecvTimeoutError::Timeout) => return Err(ClientError::Timeout(self.timeout)),
                Err(RecvTimeoutError::Disconnected) => return Err(ClientError::Closed),
            };
            if line.trim().is_empty() {
                continue;
            }
            let response: RpcResponse =
                serde_json::from_str(&line).map_err(|e| ClientError::Decode(e.to_string()))?;
            if response.id != Some(json!(id)) {
                // Late reply to a request that already timed out
                warn!(expected = id, got = ?response.id, "skipping unexpected reply");
                continue;
            }
            if let Some(error) = response.error {
                return Err(ClientError::Rpc {
                    code: error.code,
                    message: error.message,
                });
            }
            return Ok(response.result.unwrap_or(Value::Null));
        }
    }

    pub fn ping(&mut self) -> Result<(), ClientError> {
        self.request("ping", None).map(|_| ())
    }

    pub fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>, ClientError> {
        let result = self.request("tools/list", None)?;
        let tools = result.get("tools").cloned().unwrap_or(Value::Null);
        serde_json::from_value(tools).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Raw `tools/call` reply, error results included.
    pub fn call_tool_result(
        &mut self,
        name: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, ClientError> {
        let result = self.request(
            "tools/call",
            Some(json!({ "name": name, "arguments": arguments })),
        )?;
        serde_json::from_value(result).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Calls a tool and returns its payload, or the tool's error.
    pub fn call_tool(&mut self, name: &str, arguments: Value) -> ToolResult<Value> {
        self.call_tool_result(name, arguments)?.into_result()
    }

    /// Closes the server's input and waits for it to exit.
    pub fn shutdown(mut self) -> Result<ExitStatus, ClientError> {
        self.stdin.take();
        self.child.wait().map_err(ClientError::Read)
    }
}

impl Drop for ToolClient {
    fn drop(&mut self) {
        if self.stdin.take().is_some() {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}
