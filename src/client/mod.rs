//! The MCP client facade.
//!
//! [`McpClient`] is the single entry point for talking to one MCP server. It
//! wires together the transport, the correlation table, the cancellation and
//! log dispatchers, and the two connection tasks: the inbound reader and the
//! outbound writer. Callers never write to the transport themselves, so a server
//! that stops reading cannot keep a caller from being cancelled or timed out.
//!
//! ```no_run
//! use mcp_link_lib::client::{McpClient, TracingLogHandler};
//! use mcp_link_lib::config::{ClientConfig, ServerConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> mcp_link_lib::error::McpResult<()> {
//! let server = ServerConfig::new("files", "mcp-server-files", ["--root", "."]);
//! let client = McpClient::spawn(
//!     &server,
//!     ClientConfig::default(),
//!     Some(Arc::new(TracingLogHandler::for_server("files"))),
//! )?;
//!
//! client.initialize().await?;
//! let tools = client.list_tools(None).await?;
//! println!("{} tools", tools.tools.len());
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, ServerConfig};
use crate::error::{ErrorReporter, McpResult, TracingErrorReporter};
use crate::protocol::jsonrpc::codec::{encode_notification, encode_request};
use crate::protocol::jsonrpc::{ClientMethod, CorrelationTable, LogLevel, PendingRequest};
use crate::transport::{ChildProcessTransport, Transport};

pub mod cancellation;
pub mod logging;
mod outbound;
mod reader;
pub mod schema;
pub mod server_requests;

#[cfg(test)]
mod tests;

pub use cancellation::CancellationDispatcher;
pub use logging::{HandlerError, LogMessageDispatcher, LogMessageHandler, TracingLogHandler};
pub use schema::{CallToolResult, Implementation, InitializeResult, ListToolsResult, Tool};
pub use server_requests::{DefaultServerRequestHandler, ServerRequestHandler};

use outbound::{OutboundQueue, OutboundWriter};
use reader::InboundReader;

/// Reason attached to cancellations caused by a request timeout.
pub const TIMEOUT_CANCEL_REASON: &str = "Timeout";

/// How long `disconnect` lets already queued frames drain before abandoning
/// a write the server is not reading.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

struct ClientInner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    outbound: OutboundQueue,
    table: CorrelationTable,
    cancellation: CancellationDispatcher,
    logs: Arc<LogMessageDispatcher>,
    server_requests: Arc<RwLock<Arc<dyn ServerRequestHandler>>>,
    shutdown: watch::Sender<bool>,
    reader: Mutex<Option<JoinHandle<()>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    server_info: RwLock<Option<InitializeResult>>,
}

/// Client side of one MCP session.
///
/// Cheap to clone; clones share the connection. Requests may be issued from any
/// number of tasks concurrently.
#[derive(Clone)]
pub struct McpClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("config", &self.inner.config)
            .field("pending", &self.inner.table.len())
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl McpClient {
    /// Connects over an existing transport and starts the inbound reader.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(
        transport: Arc<dyn Transport>,
        config: ClientConfig,
        log_handler: Option<Arc<dyn LogMessageHandler>>,
    ) -> Self {
        Self::connect_with_reporter(
            transport,
            config,
            log_handler,
            Arc::new(TracingErrorReporter),
        )
    }

    /// Like [`connect`](Self::connect), reporting background errors to `reporter`.
    pub fn connect_with_reporter(
        transport: Arc<dyn Transport>,
        config: ClientConfig,
        log_handler: Option<Arc<dyn LogMessageHandler>>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        let table = CorrelationTable::new();
        let logs = Arc::new(LogMessageDispatcher::new(Arc::clone(&reporter)));
        logs.set_handler(log_handler);

        let default_handler: Arc<dyn ServerRequestHandler> = Arc::new(DefaultServerRequestHandler);
        let server_requests = Arc::new(RwLock::new(default_handler));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (outbound, frames) = OutboundQueue::channel();

        let writer = OutboundWriter {
            transport: Arc::clone(&transport),
            table: table.clone(),
            reporter: Arc::clone(&reporter),
            frames,
            shutdown: shutdown_rx.clone(),
        };
        let writer = tokio::spawn(writer.run());

        let reader = InboundReader {
            transport: Arc::clone(&transport),
            outbound: outbound.clone(),
            table: table.clone(),
            logs: Arc::clone(&logs),
            server_requests: Arc::clone(&server_requests),
            reporter,
            max_message_size: config.max_message_size,
            shutdown: shutdown_rx,
        };
        let reader = tokio::spawn(reader.run());

        debug!(
            default_timeout_ms = config.default_timeout_ms,
            cancel_on_timeout = config.cancel_on_timeout,
            "MCP client connected"
        );

        Self {
            inner: Arc::new(ClientInner {
                cancellation: CancellationDispatcher::new(table.clone(), outbound.clone()),
                config,
                transport,
                outbound,
                table,
                logs,
                server_requests,
                shutdown,
                reader: Mutex::new(Some(reader)),
                writer: Mutex::new(Some(writer)),
                server_info: RwLock::new(None),
            }),
        }
    }

    /// Spawns the configured server process and connects to it.
    ///
    /// Inbound lines longer than [`ClientConfig::max_message_size`] are
    /// discarded while they are read.
    pub fn spawn(
        server: &ServerConfig,
        config: ClientConfig,
        log_handler: Option<Arc<dyn LogMessageHandler>>,
    ) -> McpResult<Self> {
        let transport =
            ChildProcessTransport::spawn(server)?.with_max_frame_size(config.max_message_size);
        Ok(Self::connect(Arc::new(transport), config, log_handler))
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Returns false once the connection has been lost or closed.
    pub fn is_connected(&self) -> bool {
        !self.inner.table.is_closed()
    }

    /// Returns the number of requests awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.inner.table.len()
    }

    /// Sends a request and returns a handle to its eventual response.
    ///
    /// `timeout` defaults to [`ClientConfig::default_timeout_ms`]. The request is
    /// registered before it is queued, so a fast response is never missed. The
    /// frame is written by the outbound writer; this never waits on the server.
    pub async fn start_request<P>(
        &self,
        method: ClientMethod,
        params: &P,
        timeout: Option<Duration>,
    ) -> McpResult<RequestHandle>
    where
        P: Serialize + ?Sized,
    {
        let inner = &self.inner;
        let id = inner.table.allocate_id();
        let timeout = timeout.unwrap_or_else(|| inner.config.default_timeout());

        let frame = encode_request(method, params, id)?;
        let pending = inner.table.register(id, method, Instant::now() + timeout)?;

        debug!(request_id = id, method = %method, timeout_ms = timeout.as_millis() as u64, "Sending request");
        // Dropping `pending` on failure removes the entry
        inner.outbound.push_request(id, frame)?;

        Ok(RequestHandle {
            pending,
            cancellation: inner.cancellation.clone(),
            table: inner.table.clone(),
            cancel_on_timeout: inner.config.cancel_on_timeout,
        })
    }

    /// Sends a request and waits for its result.
    ///
    /// # Errors
    ///
    /// * [`McpError::Remote`](crate::error::McpError::Remote) if the server answered with an error object
    /// * [`McpError::Timeout`](crate::error::McpError::Timeout) if no response arrived in time
    /// * [`McpError::Cancelled`](crate::error::McpError::Cancelled) if the request was cancelled
    /// * [`McpError::Transport`](crate::error::McpError::Transport) if the connection failed
    /// * [`McpError::Encoding`](crate::error::McpError::Encoding) if `params` is not a JSON object
    pub async fn send_request<P>(
        &self,
        method: ClientMethod,
        params: &P,
        timeout: Option<Duration>,
    ) -> McpResult<Value>
    where
        P: Serialize + ?Sized,
    {
        self.start_request(method, params, timeout)
            .await?
            .response()
            .await
    }

    /// Sends a notification. Nothing is registered and nothing is awaited.
    pub async fn send_notification<P>(&self, method: ClientMethod, params: &P) -> McpResult<()>
    where
        P: Serialize + ?Sized,
    {
        let frame = encode_notification(method, params)?;
        debug!(method = %method, "Sending notification");
        self.inner.outbound.push(frame)?;
        Ok(())
    }

    /// Cancels the in-flight request `id`.
    ///
    /// The waiting caller fails with [`McpError::Cancelled`](crate::error::McpError::Cancelled) immediately,
    /// whatever state the transport is in. Returns false if no such request is pending.
    pub fn cancel(&self, id: i64, reason: Option<&str>) -> bool {
        self.inner.cancellation.cancel(id, reason)
    }

    /// Sends a request, cancelling it with `reason` if `interrupt` completes first.
    ///
    /// The request stays registered until the cancellation has been applied, so
    /// the server is told about it and the result is
    /// [`McpError::Cancelled`](crate::error::McpError::Cancelled), unless the
    /// response won the race.
    pub async fn send_request_until<P, F>(
        &self,
        method: ClientMethod,
        params: &P,
        timeout: Option<Duration>,
        interrupt: F,
        reason: &str,
    ) -> McpResult<Value>
    where
        P: Serialize + ?Sized,
        F: Future<Output = ()>,
    {
        let handle = self.start_request(method, params, timeout).await?;
        let id = handle.id();

        let response = handle.response();
        tokio::pin!(response);

        tokio::select! {
            outcome = &mut response => outcome,
            _ = interrupt => {
                warn!(request_id = id, reason, "Interrupted, cancelling request");
                self.cancel(id, Some(reason));
                response.await
            }
        }
    }

    /// Installs the handler for server log messages.
    pub fn on_log_message<H>(&self, handler: H)
    where
        H: LogMessageHandler + 'static,
    {
        self.inner.logs.set_handler(Some(Arc::new(handler)));
    }

    /// Removes the log handler. Later log messages are dropped.
    pub fn clear_log_handler(&self) {
        self.inner.logs.set_handler(None);
    }

    /// Replaces the handler for requests initiated by the server.
    pub fn on_server_request<H>(&self, handler: H)
    where
        H: ServerRequestHandler + 'static,
    {
        *self.inner.server_requests.write() = Arc::new(handler);
    }

    /// Fails every pending request, stops both connection tasks and closes the transport.
    ///
    /// Returns promptly even when the server has stopped reading: a blocked
    /// write is abandoned after a short drain window.
    pub async fn disconnect(&self) -> McpResult<()> {
        info!("Disconnecting MCP client");
        let _ = self.inner.shutdown.send(true);
        self.inner.table.fail_all("client disconnected");

        let writer = self.inner.writer.lock().take();
        if let Some(mut writer) = writer {
            if timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
                debug!("Outbound writer still blocked, aborting it");
                writer.abort();
            }
        }

        let reader = self.inner.reader.lock().take();
        if let Some(reader) = reader {
            if let Err(e) = reader.await {
                warn!(error = %e, "Inbound reader task failed");
            }
        }

        self.inner.transport.close().await?;
        Ok(())
    }

    /// Performs the MCP handshake and stores the server's answer.
    ///
    /// Sends `initialize`, then `notifications/initialized`.
    pub async fn initialize(&self) -> McpResult<InitializeResult> {
        let config = &self.inner.config;
        let params = json!({
            "protocolVersion": config.protocol_version,
            "capabilities": {},
            "clientInfo": {
                "name": config.client_name,
                "version": config.client_version,
            },
        });

        let result = self
            .send_request(ClientMethod::Initialize, &params, None)
            .await?;
        let result: InitializeResult = serde_json::from_value(result)?;

        if result.protocol_version != config.protocol_version {
            warn!(
                requested = %config.protocol_version,
                negotiated = %result.protocol_version,
                "Server chose a different protocol version"
            );
        }
        info!(
            server = %result.server_info.name,
            version = %result.server_info.version,
            protocol = %result.protocol_version,
            "MCP session initialized"
        );

        *self.inner.server_info.write() = Some(result.clone());
        self.send_notification(ClientMethod::NotificationInitialized, &())
            .await?;
        Ok(result)
    }

    /// Returns the result of a successful [`initialize`](Self::initialize).
    pub fn server_info(&self) -> Option<InitializeResult> {
        self.inner.server_info.read().clone()
    }

    /// Checks that the server is responsive.
    pub async fn ping(&self) -> McpResult<()> {
        self.send_request(ClientMethod::Ping, &(), None).await?;
        Ok(())
    }

    /// Lists the server's tools, one page at a time.
    pub async fn list_tools(&self, cursor: Option<&str>) -> McpResult<ListToolsResult> {
        let params = cursor.map(|cursor| json!({ "cursor": cursor }));
        let result = self
            .send_request(ClientMethod::ToolsList, &params, None)
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Invokes a tool with the given arguments.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<CallToolResult> {
        let params = json!({ "name": name, "arguments": arguments });
        let result = self
            .send_request(ClientMethod::ToolsCall, &params, None)
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Sets the minimum level of log messages the server should send.
    pub async fn set_log_level(&self, level: LogLevel) -> McpResult<()> {
        self.send_request(ClientMethod::LoggingSetLevel, &json!({ "level": level }), None)
            .await?;
        Ok(())
    }
}

/// A request that has been sent and not yet awaited.
///
/// Dropping the handle abandons the request; a late response is then ignored.
#[derive(Debug)]
pub struct RequestHandle {
    pending: PendingRequest,
    cancellation: CancellationDispatcher,
    table: CorrelationTable,
    cancel_on_timeout: bool,
}

impl RequestHandle {
    /// Returns the request id, as accepted by [`McpClient::cancel`].
    pub fn id(&self) -> i64 {
        self.pending.id()
    }

    /// Returns the request method.
    pub fn method(&self) -> ClientMethod {
        self.pending.method()
    }

    /// Waits for the response, the deadline, a cancellation or a disconnect.
    ///
    /// If the deadline passes and the request was still pending it is expired,
    /// and the server is told to stop working on it when `cancel_on_timeout` is
    /// set. A response that wins the race against the deadline is returned as is.
    pub async fn response(mut self) -> McpResult<Value> {
        let deadline = self.pending.deadline();
        if let Ok(outcome) = timeout_at(deadline, self.pending.wait()).await {
            return outcome;
        }

        let id = self.pending.id();
        if self.table.expire(id) {
            warn!(request_id = id, method = %self.pending.method(), "Request timed out");
            if self.cancel_on_timeout {
                if let Err(e) = self
                    .cancellation
                    .notify_server(id, Some(TIMEOUT_CANCEL_REASON.to_string()))
                {
                    debug!(request_id = id, error = %e, "Timeout cancellation not sent");
                }
            }
        }

        self.pending.wait().await
    }
}
