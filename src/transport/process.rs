//! Transport to an MCP server running as a child process.
//!
//! Frames travel over the child's stdin/stdout. Its stderr is forwarded line by
//! line to `tracing` so server diagnostics end up in the client log.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::{StdioTransport, Transport};
use crate::config::ServerConfig;
use crate::error::TransportError;

/// `tracing` target for lines the server writes to stderr.
pub const SERVER_STDERR_TARGET: &str = "mcp_link::server";

/// A [`StdioTransport`] bound to a spawned server process.
#[derive(Debug)]
pub struct ChildProcessTransport {
    name: String,
    io: StdioTransport,
    child: Mutex<Child>,
    shutdown_grace: std::time::Duration,
}

impl ChildProcessTransport {
    /// Spawns the configured server and connects to its standard streams.
    ///
    /// The process is killed if the transport is dropped without being closed.
    pub fn spawn(config: &ServerConfig) -> Result<Self, TransportError> {
        if !config.is_configured() {
            return Err(TransportError::SpawnError(
                "no server command configured".to_string(),
            ));
        }

        info!(
            server = %config.name,
            command = %config.command,
            args = ?config.args,
            working_dir = ?config.working_dir,
            "Spawning MCP server process"
        );

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &config.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            error!(error = %e, command = %config.command, "Failed to spawn process");
            TransportError::SpawnError(format!("{}: {}", config.command, e))
        })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            TransportError::SpawnError("no stdout available from spawned process".to_string())
        })?;
        let stdin = child.stdin.take().ok_or_else(|| {
            TransportError::SpawnError("no stdin available from spawned process".to_string())
        })?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(config.name.clone(), stderr));
        }

        debug!(server = %config.name, pid = ?child.id(), "Server process started");

        Ok(Self {
            name: config.name.clone(),
            io: StdioTransport::with_streams(stdout, stdin),
            child: Mutex::new(child),
            shutdown_grace: config.shutdown_grace(),
        })
    }

    /// Sets the longest line accepted from the server's stdout.
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.io = self.io.with_max_frame_size(max_frame_size);
        self
    }

    /// Returns the configured server name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl Transport for ChildProcessTransport {
    async fn send(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        self.io.send(frame).await
    }

    async fn receive(&self) -> Result<Option<Vec<u8>>, TransportError> {
        self.io.receive().await
    }

    /// Closes stdin, waits up to the grace period for the server to exit, then kills it.
    async fn close(&self) -> Result<(), TransportError> {
        if let Err(e) = self.io.close().await {
            debug!(server = %self.name, error = %e, "Closing server stdin failed");
        }

        let mut child = self.child.lock().await;
        if let Ok(Some(status)) = child.try_wait() {
            debug!(server = %self.name, %status, "Server process already exited");
            return Ok(());
        }

        match timeout(self.shutdown_grace, child.wait()).await {
            Ok(Ok(status)) => {
                info!(server = %self.name, %status, "Server process exited");
                Ok(())
            }
            Ok(Err(e)) => Err(TransportError::ReadError(e)),
            Err(_) => {
                warn!(
                    server = %self.name,
                    grace_ms = self.shutdown_grace.as_millis() as u64,
                    "Server process did not exit in time, killing it"
                );
                child.kill().await.map_err(TransportError::ReadError)
            }
        }
    }
}

async fn forward_stderr(server: String, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                info!(target: SERVER_STDERR_TARGET, server = %server, "{}", line);
            }
            Ok(None) => break,
            Err(e) => {
                debug!(server = %server, error = %e, "Stopped reading server stderr");
                break;
            }
        }
    }
}
