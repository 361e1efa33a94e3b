//! Typed payloads for the MCP session helpers on [`McpClient`](super::McpClient).
//!
//! Only the fields the client acts on are typed. Everything else stays as raw
//! JSON so newer servers do not break decoding.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name and version of an MCP client or server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementation {
    /// Implementation name
    pub name: String,
    /// Implementation version
    pub version: String,
}

/// Result of the `initialize` handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Protocol revision chosen by the server
    pub protocol_version: String,
    /// Capabilities advertised by the server
    #[serde(default)]
    pub capabilities: Value,
    /// Server identity
    pub server_info: Implementation,
    /// Usage hints for the client, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl InitializeResult {
    /// Returns true if the server advertised the `logging` capability.
    pub fn supports_logging(&self) -> bool {
        self.capabilities.get("logging").is_some()
    }
}

/// A tool offered by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    /// Tool name, used in `tools/call`
    pub name: String,
    /// Human readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema of the arguments
    #[serde(default)]
    pub input_schema: Value,
}

/// One page of `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    /// Tools on this page
    pub tools: Vec<Tool>,
    /// Cursor for the next page, absent on the last one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Outcome of `tools/call`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    /// Content items (text, image, resource, ...)
    #[serde(default)]
    pub content: Vec<Value>,
    /// True when the tool itself reported a failure
    #[serde(default)]
    pub is_error: bool,
}

impl CallToolResult {
    /// Concatenates the text content items.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|item| item.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
