//! Server process configuration module.
//!
//! This module describes how to launch the MCP server the client talks to:
//! the command line, its environment and how long it may take to exit.

use super::ConfigResult;
use super::Validate;
use crate::error::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration of the MCP server process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Name of the server (used in logs)
    pub name: String,

    /// Executable to spawn. Empty when no server is configured.
    pub command: String,

    /// Arguments passed to the executable
    pub args: Vec<String>,

    /// Extra environment variables for the server process
    pub env: BTreeMap<String, String>,

    /// Working directory of the server process, inherited when unset
    pub working_dir: Option<PathBuf>,

    /// Time the server gets to exit after its stdin is closed, in milliseconds
    pub shutdown_grace_ms: u64,

    /// Whether the server may be selected. Disabled entries stay in the file.
    pub enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "mcp-server".to_string(),
            command: String::new(),
            args: Vec::new(),
            env: BTreeMap::new(),
            working_dir: None,
            shutdown_grace_ms: 2000,
            enabled: true,
        }
    }
}

impl ServerConfig {
    /// Creates a configuration that runs `command` with `args`.
    pub fn new<I, S>(name: impl Into<String>, command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Returns true if a server command has been configured.
    pub fn is_configured(&self) -> bool {
        !self.command.trim().is_empty()
    }

    /// Returns the shutdown grace period.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Server name cannot be empty".to_string(),
            ));
        }

        if let Some(key) = self.env.keys().find(|key| key.is_empty() || key.contains('=')) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid environment variable name: {key:?}"
            )));
        }

        if let Some(dir) = &self.working_dir {
            if !dir.is_dir() {
                return Err(ConfigError::ValidationError(format!(
                    "working_dir is not a directory: {}",
                    dir.display()
                )));
            }
        }

        if self.shutdown_grace_ms > 60_000 {
            return Err(ConfigError::ValueOutOfRange {
                key: "server.shutdown_grace_ms".to_string(),
                message: "must be at most 60000".to_string(),
            });
        }

        Ok(())
    }
}
