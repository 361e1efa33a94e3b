//! Error module for the MCP Link client.
//!
//! This module provides the error handling framework for the whole crate: one
//! `thiserror` enum per concern (configuration, protocol, transport) unified in
//! [`McpError`], plus an [`ErrorReporter`] abstraction used to surface failures
//! that cannot be returned to a caller, such as a bad frame seen by the inbound
//! reader or a log handler that failed.

use std::fmt::{Display, Formatter};
use thiserror::Error;

use crate::protocol::jsonrpc::JsonRpcError;

pub mod config;
pub mod protocol;
pub mod transport;

pub use self::config::ConfigError;
pub use self::protocol::ProtocolError;
pub use self::transport::TransportError;

/// Result type alias used throughout the MCP Link client.
pub type McpResult<T> = Result<T, McpError>;

/// Core error enum for the MCP Link client.
///
/// Per-request variants (`Remote`, `Timeout`, `Cancelled`, `DuplicateId`,
/// `Encoding`) only ever reach the caller that issued the request.
/// `Transport` is connection-level and is delivered to every pending caller.
#[derive(Error, Debug)]
pub enum McpError {
    /// Errors occurring during configuration loading or validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A frame could not be decoded as JSON-RPC 2.0.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Errors related to the connection with the server.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server answered the request with a JSON-RPC error object.
    #[error("Remote error {0}")]
    Remote(JsonRpcError),

    /// No response arrived before the request deadline.
    #[error("Request {id} timed out after {after_ms} ms")]
    Timeout {
        /// The request id that expired
        id: i64,
        /// The timeout that was applied, in milliseconds
        after_ms: u64,
    },

    /// The request was cancelled by the caller.
    #[error("Request {id} was cancelled{}", reason_suffix(.reason))]
    Cancelled {
        /// The request id that was cancelled
        id: i64,
        /// Optional human-readable reason
        reason: Option<String>,
    },

    /// A request id was registered while a request with the same id was pending.
    #[error("Request id {0} is already pending")]
    DuplicateId(i64),

    /// Request or notification parameters could not be encoded.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO errors that may occur during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/Deserialization errors of decoded results.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Custom error with message for cases where specific error types are not defined.
    #[error("{0}")]
    Custom(String),
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default()
}

impl McpError {
    /// Returns true if this error was caused by the connection rather than the request.
    pub fn is_transport(&self) -> bool {
        matches!(self, McpError::Transport(_))
    }

    /// Returns true if the request timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, McpError::Timeout { .. })
    }
}

/// Error reporting structure to provide context and debugging information.
#[derive(Debug)]
pub struct ErrorContext {
    /// The original error that occurred.
    pub error: McpError,

    /// The component where the error occurred.
    pub component: String,

    /// Additional context information to help with debugging.
    pub details: Option<String>,
}

impl ErrorContext {
    /// Creates a new error context with the given error and component.
    ///
    /// # Arguments
    ///
    /// * `error` - The error that occurred
    /// * `component` - The component where the error occurred
    pub fn new<S: Into<String>>(error: McpError, component: S) -> Self {
        Self {
            error,
            component: component.into(),
            details: None,
        }
    }

    /// Adds detail information to the error context.
    pub fn with_details<S: Into<String>>(mut self, details: S) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl Display for ErrorContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error in {}: {}", self.component, self.error)?;
        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }
        Ok(())
    }
}

/// Error reporter trait for reporting errors to various sinks.
///
/// The client receives its reporter at construction time; there is no global
/// reporter.
pub trait ErrorReporter: Send + Sync + std::fmt::Debug {
    /// Report an error with context.
    fn report(&self, context: ErrorContext);
}

/// A simple error reporter implementation that logs errors using the tracing framework.
#[derive(Default, Debug)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, context: ErrorContext) {
        tracing::error!(
            error = %context.error,
            component = %context.component,
            details = context.details.as_deref().unwrap_or("None"),
            "Error reported"
        );
    }
}
