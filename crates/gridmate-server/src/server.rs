//! Line-delimited JSON-RPC server loop over any reader/writer pair.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::error::ToolError;
use crate::protocol::{
    initialize_result, CallParams, RpcError, RpcRequest, RpcResponse, ToolCallResult,
    JSONRPC_VERSION,
};
use crate::session::Session;
use crate::tools;

/// Owns the session; handles one request at a time.
pub struct Server {
    session: Session,
}

impl Server {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Handles one input line. Returns the serialized reply, or `None` for
    /// notifications and blank lines.
    pub fn handle_line(&mut self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        debug!(request = %line, "received request");

        let response = match serde_json::from_str::<Value>(line) {
            Err(e) => {
                error!(error = %e, "parse error");
                Some(RpcResponse::error(None, RpcError::parse_error(e.to_string())))
            }
            Ok(value) => {
                let id = value.get("id").cloned();
                match serde_json::from_value::<RpcRequest>(value) {
                    Ok(request) => self.handle_request(request),
                    Err(e) => Some(RpcResponse::error(id, RpcError::invalid_request(e.to_string()))),
                }
            }
        }?;

        match serde_json::to_string(&response) {
            Ok(text) => {
                debug!(response = %text, "sending response");
                Some(text)
            }
            Err(e) => {
                error!(error = %e, "failed to encode response");
                let fallback = RpcResponse::error(
                    response.id,
                    RpcError::internal_error(format!("failed to encode response: {e}")),
                );
                serde_json::to_string(&fallback).ok()
            }
        }
    }

    pub fn handle_request(&mut self, request: RpcRequest) -> Option<RpcResponse> {
        if request.jsonrpc != JSONRPC_VERSION {
            return Some(RpcResponse::error(
                request.id,
                RpcError::invalid_request(format!(
                    "unsupported jsonrpc version '{}'",
                    request.jsonrpc
                )),
            ));
        }
        if request.is_notification() {
            debug!(method = %request.method, "notification");
            return None;
        }

        let id = request.id;
        let result = match request.method.as_str() {
            "initialize" => {
                info!("client initialized session");
                initialize_result()
            }
            "ping" => json!({}),
            "tools/list" => json!({ "tools": tools::catalogue() }),
            "tools/call" => {
                let outcome = match request.params.map(serde_json::from_value::<CallParams>) {
                    Some(Ok(params)) => {
                        tools::dispatch(&mut self.session, &params.name, params.arguments)
                    }
                    Some(Err(e)) => ToolCallResult::error(&ToolError::invalid_argument(format!(
                        "invalid tools/call parameters: {e}"
                    ))),
                    None => ToolCallResult::error(&ToolError::invalid_argument(
                        "tools/call requires a tool name",
                    )),
                };
                match serde_json::to_value(&outcome) {
                    Ok(value) => value,
                    Err(e) => {
                        return Some(RpcResponse::error(
                            id,
                            RpcError::internal_error(format!("failed to encode tool result: {e}")),
                        ))
                    }
                }
            }
            other => return Some(RpcResponse::error(id, RpcError::method_not_found(other))),
        };
        Some(RpcResponse::success(id, result))
    }

    /// Reads requests until end of input, writing one reply line per request.
    pub fn serve<R: BufRead, W: Write>(&mut self, reader: R, mut writer: W) -> Result<()> {
        info!("serving tools over stdio");
        for line in reader.lines() {
            let line = line.context("failed to read request line")?;
            if let Some(reply) = self.handle_line(&line) {
                writer
                    .write_all(reply.as_bytes())
                    .and_then(|_| writer.write_all(b"\n"))
                    .and_then(|_| writer.flush())
                    .context("failed to write response")?;
            }
        }
        info!("input closed, shutting down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(server: &mut Server, line: &str) -> Value {
        let text = server.handle_line(line).expect("reply expected");
        serde_json::from_str(&text).unwrap()
    }

    #[test]
    fn test_ping_and_initialize() {
        let mut server = Server::new(Session::default());
        let pong = reply(&mut server, r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#);
        assert_eq!(pong["result"], json!({}));
        assert_eq!(pong["id"], 1);

        let init = reply(
            &mut server,
            r#"{"jsonrpc":"2.0","id":"a","method":"initialize","params":{}}"#,
        );
        assert_eq!(init["result"]["serverInfo"]["name"], "gridmate-server");
    }

    #[test]
    fn test_notifications_and_blank_lines_are_silent() {
        let mut server = Server::new(Session::default());
        assert!(server
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .is_none());
        assert!(server.handle_line("   ").is_none());
    }

    #[test]
    fn test_protocol_errors() {
        let mut server = Server::new(Session::default());
        let unknown = reply(&mut server, r#"{"jsonrpc":"2.0","id":2,"method":"resources/list"}"#);
        assert_eq!(unknown["error"]["code"], RpcError::METHOD_NOT_FOUND);

        let garbage = reply(&mut server, "{not json");
        assert_eq!(garbage["error"]["code"], RpcError::PARSE_ERROR);
        assert!(garbage["id"].is_null());

        let no_method = reply(&mut server, r#"{"jsonrpc":"2.0","id":3}"#);
        assert_eq!(no_method["error"]["code"], RpcError::INVALID_REQUEST);
        assert_eq!(no_method["id"], 3);
    }

    #[test]
    fn test_tool_call_without_name_is_tool_error() {
        let mut server = Server::new(Session::default());
        let out = reply(
            &mut server,
            r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"arguments":{}}}"#,
        );
        assert_eq!(out["result"]["isError"], true);
        assert_eq!(out["result"]["structuredContent"]["error_kind"], "invalid_argument");
    }

    #[test]
    fn test_serve_writes_one_line_per_request() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"get_network_info"}}"#,
            "\n",
        );
        let mut output = Vec::new();
        let mut server = Server::new(Session::default());
        server.serve(input.as_bytes(), &mut output).unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let call: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(call["result"]["structuredContent"]["error_kind"], "no_network_loaded");
    }
}
