//! Client behaviour configuration module.
//!
//! Timeouts, frame size limits and the identity the client announces during
//! the MCP handshake.

use super::ConfigResult;
use super::Validate;
use crate::error::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// MCP protocol revision announced in `initialize`.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2025-03-26";

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Timeout applied to requests that do not specify one, in milliseconds
    pub default_timeout_ms: u64,

    /// Inbound frames larger than this are discarded, in bytes
    pub max_message_size: usize,

    /// Send `notifications/cancelled` to the server when a request times out
    pub cancel_on_timeout: bool,

    /// Client name sent in `initialize`
    pub client_name: String,

    /// Client version sent in `initialize`
    pub client_version: String,

    /// Protocol revision sent in `initialize`
    pub protocol_version: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30000,
            max_message_size: 10 * 1024 * 1024, // 10 MiB
            cancel_on_timeout: true,
            client_name: env!("CARGO_PKG_NAME").to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
        }
    }
}

impl ClientConfig {
    /// Returns the default request timeout.
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

impl Validate for ClientConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.default_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "default_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.max_message_size == 0 {
            return Err(ConfigError::ValidationError(
                "max_message_size must be greater than 0".to_string(),
            ));
        }

        if self.client_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "client_name cannot be empty".to_string(),
            ));
        }

        if self.protocol_version.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "protocol_version cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
