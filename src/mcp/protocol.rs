//! MCP Protocol Types and Messages
//!
//! The subset of JSON-RPC 2.0 and Model Context Protocol messages a probe
//! client sends. Replies are kept as raw [`serde_json::Value`]s so that
//! whatever the server answers can be shown verbatim.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// MCP protocol version announced during `initialize`
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC 2.0 version identifier
pub const JSONRPC_VERSION: &str = "2.0";

/// Client name announced in `clientInfo`
pub const CLIENT_NAME: &str = "mcp-probe";

/// Unique identifier for JSON-RPC messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl From<i64> for RequestId {
    #[inline]
    fn from(id: i64) -> Self {
        Self::Number(id)
    }
}

/// JSON-RPC 2.0 Request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    pub params: Value,
}

/// JSON-RPC 2.0 Notification message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
}

/// MCP Initialize Request parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitializeParams {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ClientCapabilities,
    #[serde(rename = "clientInfo")]
    pub client_info: Implementation,
}

/// Client capabilities. A probe advertises none, which serializes to `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<Map<String, Value>>,
}

/// Implementation information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

/// Tool call request parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request
    #[inline]
    pub fn new(id: impl Into<RequestId>, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.to_string(),
            params,
        }
    }

    /// `initialize` with the probe's client identity and no capabilities
    #[inline]
    pub fn initialize(id: impl Into<RequestId>) -> Self {
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation {
                name: CLIENT_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };
        // A plain struct of strings and maps always serializes.
        let params = serde_json::to_value(params).unwrap_or_else(|_| Value::Object(Map::new()));
        Self::new(id, "initialize", params)
    }

    #[inline]
    pub fn list_tools(id: impl Into<RequestId>) -> Self {
        Self::new(id, "tools/list", Value::Object(Map::new()))
    }

    #[inline]
    pub fn list_prompts(id: impl Into<RequestId>) -> Self {
        Self::new(id, "prompts/list", Value::Object(Map::new()))
    }

    /// `tools/call` for a tool taking a single string argument
    #[inline]
    pub fn call_tool(id: impl Into<RequestId>, tool: &str, argument: &str, value: &str) -> Self {
        let mut arguments = Map::new();
        arguments.insert(argument.to_string(), Value::String(value.to_string()));
        let params = CallToolParams {
            name: tool.to_string(),
            arguments,
        };
        let params = serde_json::to_value(params).unwrap_or_else(|_| Value::Object(Map::new()));
        Self::new(id, "tools/call", params)
    }
}

impl JsonRpcNotification {
    /// Create a new JSON-RPC notification
    #[inline]
    pub fn new(method: &str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params,
        }
    }

    /// The `initialized` notification completing the handshake
    #[inline]
    pub fn initialized() -> Self {
        Self::new("initialized", Value::Object(Map::new()))
    }
}

/// Wrap text that is not valid JSON so it can still be displayed and stored.
#[inline]
pub fn raw_value(text: &str) -> Value {
    let mut object = Map::new();
    object.insert("raw".to_string(), Value::String(text.to_string()));
    Value::Object(object)
}

/// Parse `text` as JSON, falling back to `{"raw": text}`.
#[inline]
pub fn parse_or_raw(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| raw_value(text))
}
