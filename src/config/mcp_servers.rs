//! Import of server definitions in the `mcpServers` JSON format.
//!
//! This is the format shared by Claude Desktop and most MCP hosts:
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "filesystem": {
//!       "command": "npx",
//!       "args": ["-y", "@modelcontextprotocol/server-filesystem", "/tmp"],
//!       "env": { "API_KEY": "value" },
//!       "enabled": true
//!     }
//!   }
//! }
//! ```
//!
//! `enabled` is optional and defaults to true. Entries for a network transport
//! (`"transport": "http"` or `"http-sse"`) are skipped, since only process
//! servers can be launched. Other unknown fields are ignored.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use super::{ConfigResult, ServerConfig};
use crate::error::config::ConfigError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct McpServersFile {
    mcp_servers: Option<BTreeMap<String, McpServerEntry>>,
}

#[derive(Debug, Deserialize)]
struct McpServerEntry {
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default = "enabled_by_default")]
    enabled: bool,
    #[serde(default)]
    transport: Option<String>,
}

fn enabled_by_default() -> bool {
    true
}

/// Parses the `mcpServers` object of a JSON document into named server configurations.
///
/// # Errors
///
/// * [`ConfigError::ParseError`] if the text is not JSON or has no `mcpServers` object
/// * [`ConfigError::ValidationError`] if a process server has no `command`
pub fn parse_mcp_servers(json: &str) -> ConfigResult<BTreeMap<String, ServerConfig>> {
    let file: McpServersFile = serde_json::from_str(json)
        .map_err(|e| ConfigError::ParseError(format!("Invalid mcpServers JSON: {e}")))?;
    let entries = file.mcp_servers.ok_or_else(|| {
        ConfigError::ParseError("Missing 'mcpServers' root object in JSON".to_string())
    })?;

    let mut servers = BTreeMap::new();
    for (name, entry) in entries {
        match entry.transport.as_deref() {
            None | Some("stdio") => {}
            Some(other) => {
                warn!(server = %name, transport = %other, "Skipping server with unsupported transport");
                continue;
            }
        }

        let command = entry.command.filter(|command| !command.trim().is_empty()).ok_or_else(|| {
            ConfigError::ValidationError(format!("Server '{name}' requires 'command' field"))
        })?;

        let mut server = ServerConfig::new(name.clone(), command, entry.args);
        server.env = entry.env;
        server.enabled = entry.enabled;
        servers.insert(name, server);
    }

    debug!(count = servers.len(), "Imported mcpServers entries");
    Ok(servers)
}

/// Reads and parses an `mcpServers` JSON file.
pub fn load_mcp_servers(path: &Path) -> ConfigResult<BTreeMap<String, ServerConfig>> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }
    let json = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))?;
    parse_mcp_servers(&json)
}
