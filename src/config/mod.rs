//! Configuration module for the MCP Link client.
//!
//! This module provides a layered configuration system: built-in defaults, then
//! an optional file (TOML, YAML, JSON), then environment variables. All values
//! are validated before use.
//!
//! There is no global configuration. The loaded [`McpLinkConfig`] is handed to
//! the components that need it.
//!
//! Besides the single `[server]` section, any number of named servers can be
//! declared under `[servers.<name>]` or imported from an `mcpServers` JSON file
//! (see [`mcp_servers`]). One of them is picked with
//! [`McpLinkConfig::select_server`].

use crate::error::config::ConfigError;
use config::{Config, ConfigError as ExternalConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub mod client;
pub mod mcp_servers;
pub mod server;

pub use client::ClientConfig;
pub use mcp_servers::{load_mcp_servers, parse_mcp_servers};
pub use server::ServerConfig;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Default environment variable prefix for configuration overrides.
///
/// Nested keys are separated by `__`, e.g. `MCP_LINK_CLIENT__DEFAULT_TIMEOUT_MS`.
pub const ENV_PREFIX: &str = "MCP_LINK";

/// A trait for types that can be validated.
pub trait Validate {
    /// Validates that the configuration is correct.
    ///
    /// # Returns
    ///
    /// * `Ok(())` if the configuration is valid
    /// * `Err(ConfigError)` if the configuration is invalid
    fn validate(&self) -> ConfigResult<()>;
}

/// Main configuration for the MCP Link client.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct McpLinkConfig {
    /// Client behaviour
    pub client: ClientConfig,

    /// Server process to launch when no named server is selected
    pub server: ServerConfig,

    /// Named servers, keyed by name
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub servers: BTreeMap<String, ServerConfig>,

    /// `mcpServers` JSON file whose entries are added to `servers`
    pub mcp_servers_file: Option<PathBuf>,

    /// Log configuration
    pub log: LogConfig,
}

impl McpLinkConfig {
    /// Adds the entries of an `mcpServers` JSON file to [`servers`](Self::servers).
    ///
    /// Servers already declared keep their definition. Returns how many were added.
    pub fn import_mcp_servers(&mut self, path: &Path) -> ConfigResult<usize> {
        let imported = load_mcp_servers(path)?;
        let mut added = 0;
        for (name, server) in imported {
            if self.servers.contains_key(&name) {
                tracing::debug!(server = %name, "Keeping configured server over imported one");
                continue;
            }
            self.servers.insert(name, server);
            added += 1;
        }
        Ok(added)
    }

    /// Returns the named servers that are enabled.
    pub fn enabled_servers(&self) -> impl Iterator<Item = &ServerConfig> {
        self.servers.values().filter(|server| server.enabled)
    }

    /// Picks the server to launch.
    ///
    /// With a name, that named server, which must exist and be enabled. Without
    /// one, the `[server]` section if it has a command, otherwise the only enabled
    /// named server.
    pub fn select_server(&self, name: Option<&str>) -> ConfigResult<ServerConfig> {
        if let Some(name) = name {
            let server = self.servers.get(name).ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "Unknown server '{name}'; configured: {}",
                    self.server_names()
                ))
            })?;
            if !server.enabled {
                return Err(ConfigError::ValidationError(format!(
                    "Server '{name}' is disabled"
                )));
            }
            return Ok(server.clone());
        }

        if self.server.is_configured() {
            return Ok(self.server.clone());
        }

        let mut enabled = self.enabled_servers();
        match (enabled.next(), enabled.next()) {
            (Some(server), None) => Ok(server.clone()),
            (None, _) => Err(ConfigError::ValidationError(
                "No server configured; set [server] command, add [servers.<name>] or import mcpServers"
                    .to_string(),
            )),
            (Some(_), Some(_)) => Err(ConfigError::ValidationError(format!(
                "Several servers configured ({}); select one by name",
                self.server_names()
            ))),
        }
    }

    fn server_names(&self) -> String {
        let names: Vec<&str> = self.enabled_servers().map(|server| server.name.as_str()).collect();
        if names.is_empty() {
            "none".to_string()
        } else {
            names.join(", ")
        }
    }

    /// Names every server after its key in [`servers`](Self::servers).
    fn name_servers(&mut self) {
        for (name, server) in self.servers.iter_mut() {
            server.name = name.clone();
        }
    }
}

impl Validate for McpLinkConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.client.validate()?;
        self.server.validate()?;
        for server in self.servers.values() {
            server.validate()?;
        }
        self.log.validate()?;
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error), overridden by `RUST_LOG`
    pub level: String,

    /// Whether to log in JSON format
    pub json: bool,

    /// Whether to include source code locations in logs
    pub source_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            source_location: false,
        }
    }
}

impl Validate for LogConfig {
    fn validate(&self) -> ConfigResult<()> {
        match self.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => Err(ConfigError::ValidationError(format!(
                "Invalid log level: {}",
                self.level
            ))),
        }
    }
}

/// Configuration loader for the MCP Link client.
#[derive(Debug)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    env_prefix: String,
}

impl ConfigLoader {
    /// Creates a new configuration loader.
    ///
    /// # Arguments
    ///
    /// * `config_path` - Optional path to the configuration file
    /// * `env_prefix` - Prefix for environment variables that override configuration values
    pub fn new<P: AsRef<Path>>(config_path: Option<P>, env_prefix: &str) -> Self {
        Self {
            config_path: config_path.map(|p| p.as_ref().to_path_buf()),
            env_prefix: env_prefix.to_string(),
        }
    }

    /// Loads the configuration from defaults, the file and environment variables.
    ///
    /// # Returns
    ///
    /// * `Ok(McpLinkConfig)` if the configuration was loaded and is valid
    /// * `Err(ConfigError)` if there was an error loading the configuration
    pub fn load(&self) -> ConfigResult<McpLinkConfig> {
        let mut builder = Config::builder().add_source(
            Config::try_from(&McpLinkConfig::default()).map_err(map_external_error)?,
        );

        if let Some(path) = &self.config_path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }

            let format = match path.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => FileFormat::Toml,
                Some("json") => FileFormat::Json,
                Some("yaml" | "yml") => FileFormat::Yaml,
                _ => {
                    return Err(ConfigError::ParseError(format!(
                        "Unsupported file extension for: {path:?}"
                    )))
                }
            };
            builder = builder.add_source(File::from(path.as_path()).format(format));
        }

        builder = builder.add_source(
            Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: McpLinkConfig = builder
            .build()
            .map_err(map_external_error)?
            .try_deserialize()
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.name_servers();
        if let Some(path) = config.mcp_servers_file.clone() {
            let path = self.resolve_relative(&path);
            config.import_mcp_servers(&path)?;
        }

        config.validate()?;

        tracing::debug!(
            path = ?self.config_path,
            server = %config.server.name,
            servers = config.servers.len(),
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Resolves `path` against the configuration file's directory.
    fn resolve_relative(&self, path: &Path) -> PathBuf {
        match self.config_path.as_deref().and_then(Path::parent) {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// Loads the configuration using the default environment prefix.
pub fn load_config(config_path: Option<&Path>) -> ConfigResult<McpLinkConfig> {
    ConfigLoader::new(config_path, ENV_PREFIX).load()
}

/// Renders a configuration as TOML.
pub fn to_toml(config: &McpLinkConfig) -> ConfigResult<String> {
    toml::to_string_pretty(config).map_err(|e| ConfigError::ParseError(e.to_string()))
}

fn map_external_error(error: ExternalConfigError) -> ConfigError {
    match error {
        ExternalConfigError::NotFound(path) => ConfigError::FileNotFound(PathBuf::from(path)),
        ExternalConfigError::FileParse { uri, cause } => ConfigError::ParseError(format!(
            "Error parsing config file {}: {cause}",
            uri.unwrap_or_default()
        )),
        ExternalConfigError::Message(msg) => ConfigError::ParseError(msg),
        other => ConfigError::ParseError(other.to_string()),
    }
}
