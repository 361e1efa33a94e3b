//! MCP Link - Main entrypoint.
//!
//! Command line front end for the MCP Link client. It loads configuration,
//! sets up logging, launches the configured MCP server and issues requests
//! against it.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use mcp_link_lib::client::{McpClient, TracingLogHandler};
use mcp_link_lib::config::{
    self, ClientConfig, ConfigLoader, LogConfig, McpLinkConfig, ServerConfig, Validate, ENV_PREFIX,
};
use mcp_link_lib::protocol::jsonrpc::ClientMethod;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Command line arguments for MCP Link.
#[derive(Parser, Debug)]
#[clap(name = "MCP Link", version, author, about)]
struct Args {
    /// Path to configuration file
    #[clap(short, long, value_parser)]
    config: Option<PathBuf>,

    /// Named server to launch, from `[servers.<name>]` or an mcpServers file
    #[clap(short, long, value_parser, conflicts_with = "server")]
    name: Option<String>,

    /// mcpServers JSON file (Claude Desktop format) to import servers from
    #[clap(long, value_parser)]
    mcp_servers: Option<PathBuf>,

    /// Server command, overriding the configured one
    #[clap(long, value_parser)]
    server: Option<String>,

    /// Arguments for the server command (repeatable)
    #[clap(long = "arg", value_parser, allow_hyphen_values = true)]
    server_args: Vec<String>,

    /// Command to execute
    #[clap(subcommand)]
    command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the server answers pings
    Ping,

    /// List the tools offered by the server
    Tools,

    /// Send one request and print its result
    Call {
        /// Method name, e.g. `tools/call`
        method: String,

        /// Parameters as a JSON object
        #[clap(short, long, value_parser)]
        params: Option<String>,

        /// Request timeout in milliseconds
        #[clap(short, long, value_parser)]
        timeout_ms: Option<u64>,
    },

    /// List the configured servers
    Servers,

    /// Validate the configuration file
    Validate,

    /// Generate a default configuration file
    GenConfig {
        /// Path to output configuration file
        #[clap(short, long, value_parser)]
        output: PathBuf,
    },
}

/// Initialize the logging system.
///
/// `RUST_LOG` takes precedence over the configured level. Logs go to stderr so
/// stdout carries only results.
fn init_logging(log: &LogConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&log.level)
            .with_context(|| format!("invalid log level: {}", log.level))?,
    };

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = if log.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_file(log.source_location)
            .with_line_number(log.source_location)
            .boxed()
    } else {
        fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_file(log.source_location)
            .with_line_number(log.source_location)
            .with_thread_names(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .with(filter)
        .try_init()
        .context("Failed to set global tracing subscriber")
}

/// Starts the selected server and completes the handshake.
async fn open_session(server: &ServerConfig, client_config: &ClientConfig) -> anyhow::Result<McpClient> {
    if !server.is_configured() {
        bail!("no server command configured; set [server] command, pass --server or select one with --name");
    }

    let handler = TracingLogHandler::for_server(server.name.clone());
    let client = McpClient::spawn(server, client_config.clone(), Some(Arc::new(handler)))
        .with_context(|| format!("failed to start server {}", server.name))?;

    let info = client.initialize().await.context("initialize failed")?;
    info!(server = %info.server_info.name, "Connected");
    Ok(client)
}

/// Sends one request, cancelling it on Ctrl-C.
async fn call(
    client: &McpClient,
    method: ClientMethod,
    params: Option<Value>,
    timeout: Option<Duration>,
) -> anyhow::Result<Value> {
    let interrupt = async {
        // Without a signal handler the request simply runs to completion
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let result = client
        .send_request_until(method, &params, timeout, interrupt, "Interrupted")
        .await?;
    Ok(result)
}

fn command_line(server: &ServerConfig) -> String {
    std::iter::once(server.command.as_str())
        .chain(server.args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Main entry point for the application.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    // Load configuration
    let config_loader = ConfigLoader::new(args.config.as_deref(), ENV_PREFIX);

    if let Command::GenConfig { output } = &args.command {
        init_logging(&LogConfig::default())?;
        info!("Generating default configuration");

        // Create parent directories if they don't exist
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(output, config::to_toml(&McpLinkConfig::default())?)?;

        info!("Default configuration written to {:?}", output);
        return Ok(());
    }

    let mut config = config_loader.load().context("Configuration error")?;
    init_logging(&config.log)?;

    if let Some(path) = &args.mcp_servers {
        let added = config
            .import_mcp_servers(path)
            .with_context(|| format!("failed to import servers from {}", path.display()))?;
        config.validate().context("Configuration error")?;
        info!(added, "Imported mcpServers entries");
    }

    // Commands that launch a server resolve it here
    let server = || -> anyhow::Result<ServerConfig> {
        match &args.server {
            Some(command) => {
                let mut server = config.server.clone();
                server.command = command.clone();
                server.args = args.server_args.clone();
                Ok(server)
            }
            None => Ok(config.select_server(args.name.as_deref())?),
        }
    };

    match &args.command {
        Command::Validate => {
            info!("Configuration validated successfully");
            Ok(())
        }
        Command::GenConfig { .. } => Ok(()),
        Command::Servers => {
            if config.server.is_configured() {
                println!("[server]\tenabled\t{}", command_line(&config.server));
            }
            for (name, server) in &config.servers {
                let state = if server.enabled { "enabled" } else { "disabled" };
                println!("{name}\t{state}\t{}", command_line(server));
            }
            Ok(())
        }
        Command::Ping => {
            let client = open_session(&server()?, &config.client).await?;
            client.ping().await?;
            println!("pong");
            client.disconnect().await?;
            Ok(())
        }
        Command::Tools => {
            let client = open_session(&server()?, &config.client).await?;
            let mut cursor: Option<String> = None;
            loop {
                let page = client.list_tools(cursor.as_deref()).await?;
                for tool in &page.tools {
                    println!("{}\t{}", tool.name, tool.description.as_deref().unwrap_or(""));
                }
                match page.next_cursor {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }
            client.disconnect().await?;
            Ok(())
        }
        Command::Call {
            method,
            params,
            timeout_ms,
        } => {
            let method: ClientMethod = method.parse()?;
            let params = params
                .as_deref()
                .map(serde_json::from_str::<Value>)
                .transpose()
                .context("--params is not valid JSON")?;

            let client = open_session(&server()?, &config.client).await?;
            let outcome = call(&client, method, params, timeout_ms.map(Duration::from_millis)).await;
            client.disconnect().await?;
            print_json(&outcome?)
        }
    }
}
