//! Tests for the client facade against an in-memory fake server.
//!
//! The fake server sits on the other end of a `tokio::io::duplex` pipe and
//! speaks newline-delimited JSON, exactly like a server on stdio.

mod session_tests;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};

use super::{LogMessageHandler, McpClient};
use crate::config::ClientConfig;
use crate::error::{ErrorContext, ErrorReporter, TracingErrorReporter};
use crate::transport::StdioTransport;

/// The server end of a test connection.
pub(super) struct FakeServer {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
}

impl FakeServer {
    /// Reads the next frame written by the client.
    pub(super) async fn next_frame(&mut self) -> Value {
        let line = tokio::time::timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .expect("timed out waiting for a client frame")
            .expect("failed to read client frame")
            .expect("client closed the connection");
        serde_json::from_str(&line).expect("client wrote invalid JSON")
    }

    /// Returns the next frame, or None once the client closed its output.
    pub(super) async fn try_next_frame(&mut self) -> Option<Value> {
        let line = self.lines.next_line().await.ok()??;
        serde_json::from_str(&line).ok()
    }

    /// Writes a JSON value as one frame.
    pub(super) async fn send(&mut self, frame: Value) {
        self.send_raw(&frame.to_string()).await;
    }

    /// Writes raw text as one frame.
    pub(super) async fn send_raw(&mut self, frame: &str) {
        self.writer.write_all(frame.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }
}

/// Error reporter that keeps every report for inspection.
#[derive(Debug, Default)]
pub(super) struct RecordingReporter {
    reports: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub(super) fn reports(&self) -> Vec<String> {
        self.reports.lock().clone()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, context: ErrorContext) {
        self.reports.lock().push(context.to_string());
    }
}

/// Connects a client to a fake server with the given options.
pub(super) fn connect_with(
    config: ClientConfig,
    log_handler: Option<Arc<dyn LogMessageHandler>>,
    reporter: Arc<dyn ErrorReporter>,
) -> (McpClient, FakeServer) {
    let (client_side, server_side) = tokio::io::duplex(64 * 1024);
    let (client_read, client_write) = tokio::io::split(client_side);
    let transport = StdioTransport::with_streams(client_read, client_write)
        .with_max_frame_size(config.max_message_size);
    let client = McpClient::connect_with_reporter(Arc::new(transport), config, log_handler, reporter);

    let (server_read, server_write) = tokio::io::split(server_side);
    let server = FakeServer {
        lines: BufReader::new(server_read).lines(),
        writer: server_write,
    };
    (client, server)
}

/// Connects a client with default configuration.
pub(super) fn connect() -> (McpClient, FakeServer) {
    connect_with(ClientConfig::default(), None, Arc::new(TracingErrorReporter))
}

/// Connects a client to a server that never reads.
///
/// The pipe holds 64 bytes, so any larger frame blocks the client's writer.
/// Keep the returned stream alive to keep the pipe open.
pub(super) fn connect_stalled(config: ClientConfig) -> (McpClient, DuplexStream) {
    let (client_side, server_side) = tokio::io::duplex(64);
    let (client_read, client_write) = tokio::io::split(client_side);
    let transport = StdioTransport::with_streams(client_read, client_write);
    let client = McpClient::connect(Arc::new(transport), config, None);
    (client, server_side)
}

/// Waits until `client` has `count` requests in flight.
pub(super) async fn wait_for_pending(client: &McpClient, count: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while client.pending_requests() != count {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("request was never registered");
}
