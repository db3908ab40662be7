//! JSON-RPC 2.0 message types and the MCP tool-call envelope.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ToolError;

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC 2.0 request. A request without `id` is a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: method.into(),
            params: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 reply carrying exactly one of `result` or `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self::reply(id, Ok(result))
    }

    pub fn error(id: Option<Value>, error: RpcError) -> Self {
        Self::reply(id, Err(error))
    }

    fn reply(id: Option<Value>, outcome: Result<Value, RpcError>) -> Self {
        let (result, error) = match outcome {
            Ok(value) => (Some(value), None),
            Err(err) => (None, Some(err)),
        };
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result,
            error,
        }
    }
}

/// Protocol-level failure. Tool failures travel inside a successful
/// `tools/call` reply instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcError {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INTERNAL_ERROR: i32 = -32603;

    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self {
            code: Self::PARSE_ERROR,
            message: msg.into(),
        }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self {
            code: Self::INVALID_REQUEST,
            message: msg.into(),
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: Self::METHOD_NOT_FOUND,
            message: format!("unknown method '{method}'"),
        }
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self {
            code: Self::INTERNAL_ERROR,
            message: msg.into(),
        }
    }
}

/// Entry of the `tools/list` catalogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// `tools/call` parameters
#[derive(Debug, Clone, Deserialize)]
pub struct CallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// `tools/call` result. The payload appears both as text content and as
/// `structuredContent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub content: Vec<TextContent>,
    #[serde(rename = "structuredContent")]
    pub structured_content: Value,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl ToolCallResult {
    fn from_payload(payload: Value, is_error: bool) -> Self {
        Self {
            content: vec![TextContent {
                kind: "text".to_string(),
                text: payload.to_string(),
            }],
            structured_content: payload,
            is_error,
        }
    }

    /// Success payload: `status`, `message`, then the operation's fields.
    pub fn success(message: impl Into<String>, data: Value) -> Self {
        let mut payload = json!({
            "status": "success",
            "message": message.into(),
        });
        if let (Some(out), Value::Object(fields)) = (payload.as_object_mut(), data) {
            for (key, value) in fields {
                out.insert(key, value);
            }
        }
        Self::from_payload(payload, false)
    }

    pub fn error(err: &ToolError) -> Self {
        Self::from_payload(
            json!({
                "status": "error",
                "error_kind": err.kind(),
                "message": err.to_string(),
            }),
            true,
        )
    }

    /// Converts back into the library error on the caller side.
    pub fn into_result(self) -> Result<Value, ToolError> {
        if !self.is_error {
            return Ok(self.structured_content);
        }
        let field = |name: &str| {
            self.structured_content
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Err(ToolError::from_kind(&field("error_kind"), field("message")))
    }
}

pub fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": { "listChanged": false }
        },
        "serverInfo": {
            "name": "gridmate-server",
            "version": env!("CARGO_PKG_VERSION"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = RpcRequest::new("tools/list").with_id(json!(1));
        let json_str = serde_json::to_string(&req).unwrap();
        assert!(json_str.contains("tools/list"));
        assert!(!json_str.contains("params"));
        assert!(!req.is_notification());
        assert!(RpcRequest::new("notifications/initialized").is_notification());
    }

    #[test]
    fn test_error_response_shape() {
        let resp = RpcResponse::error(Some(json!(4)), RpcError::method_not_found("foo/bar"));
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["error"]["code"], -32601);
        assert!(value.get("result").is_none());
        assert_eq!(value["error"]["message"], "unknown method 'foo/bar'");
    }

    #[test]
    fn test_success_payload_merges_fields() {
        let result = ToolCallResult::success("Added bus 3", json!({"index": 3}));
        assert!(!result.is_error);
        assert_eq!(result.structured_content["status"], "success");
        assert_eq!(result.structured_content["index"], 3);
        let text: Value = serde_json::from_str(&result.content[0].text).unwrap();
        assert_eq!(text, result.structured_content);
    }

    #[test]
    fn test_error_payload_roundtrip() {
        let result = ToolCallResult::error(&ToolError::NoNetworkLoaded);
        assert!(result.is_error);
        assert_eq!(result.structured_content["status"], "error");
        assert_eq!(result.structured_content["error_kind"], "no_network_loaded");
        assert_eq!(result.into_result().unwrap_err(), ToolError::NoNetworkLoaded);
    }
}
