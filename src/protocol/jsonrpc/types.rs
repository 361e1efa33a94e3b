// Copyright (c) 2025 MCP Link Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! Types for the JSON-RPC 2.0 messages exchanged with an MCP server.
//!
//! Two layers live here. The wire structs ([`Request`], [`Response`]) mirror the
//! JSON shapes of the [specification](https://www.jsonrpc.org/specification).
//! The tagged unions ([`ClientMessage`], [`InboundMessage`]) are what the rest of
//! the crate matches on: every outbound message is a `ClientMessage`, every
//! decoded inbound frame is an `InboundMessage`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use super::error::JsonRpcError;
use super::methods::{ClientMethod, ServerNotificationMethod};
use crate::error::ProtocolError;

/// JSON-RPC version string carried by every message.
pub const JSONRPC_VERSION: &str = "2.0";

/// Named parameters of a message. Keys are unique; order is irrelevant.
pub type Params = Map<String, Value>;

/// JSON-RPC request identifier.
///
/// The client only ever allocates numeric ids, but servers may use strings for the
/// requests they send to the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Id {
    /// Numeric identifier
    Number(i64),

    /// String identifier
    String(String),

    /// Null identifier (sent by servers that could not read the request id)
    Null,
}

impl Id {
    /// Returns the numeric value of the id, accepting numeric strings.
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Id::Number(n) => Some(*n),
            Id::String(s) => s.parse().ok(),
            Id::Null => None,
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::String(s) => write!(f, "{}", s),
            Id::Number(n) => write!(f, "{}", n),
            Id::Null => write!(f, "null"),
        }
    }
}

/// A JSON-RPC 2.0 request object as it appears on the wire.
///
/// Used both for requests the server sends to the client and as the serialized
/// form of every [`ClientMessage`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Request {
    /// JSON-RPC protocol version, always "2.0"
    pub jsonrpc: String,

    /// Request identifier, if None then the request is a notification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,

    /// Name of the method to be invoked
    pub method: String,

    /// Method parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    /// Creates a new JSON-RPC 2.0 request.
    pub fn new(method: impl Into<String>, params: Option<Value>, id: Option<Id>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }

    /// Returns true if this request is a notification (no id).
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// A JSON-RPC 2.0 response object.
///
/// Exactly one of `result` and `error` is present on a well-formed response. An
/// explicit `"result": null` decodes to `Some(Value::Null)`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Response {
    /// JSON-RPC protocol version, always "2.0"
    pub jsonrpc: String,

    /// Same identifier as the request this is responding to
    pub id: Id,

    /// The result of the method invocation, if successful.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// The error object, if an error occurred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl Response {
    /// Creates a new successful JSON-RPC 2.0 response.
    pub fn success(id: Id, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Creates a new error JSON-RPC 2.0 response.
    pub fn error(id: Id, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Returns true if this response contains an error.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Splits the response into its success payload or error object.
    pub fn into_outcome(self) -> Result<Value, JsonRpcError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// A message sent from the client to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// A request that the server must answer with a response carrying `id`.
    Request {
        /// Correlation id allocated by the client
        id: i64,
        /// Method to invoke
        method: ClientMethod,
        /// Named parameters, omitted on the wire when `None`
        params: Option<Params>,
    },

    /// A one-way message; never answered and never correlated.
    Notification {
        /// Notification method
        method: ClientMethod,
        /// Named parameters, omitted on the wire when `None`
        params: Option<Params>,
    },
}

impl ClientMessage {
    /// Returns the correlation id for requests, `None` for notifications.
    pub fn id(&self) -> Option<i64> {
        match self {
            ClientMessage::Request { id, .. } => Some(*id),
            ClientMessage::Notification { .. } => None,
        }
    }

    /// Returns the method of the message.
    pub fn method(&self) -> ClientMethod {
        match self {
            ClientMessage::Request { method, .. } | ClientMessage::Notification { method, .. } => {
                *method
            }
        }
    }

    /// Returns the parameters of the message.
    pub fn params(&self) -> Option<&Params> {
        match self {
            ClientMessage::Request { params, .. } | ClientMessage::Notification { params, .. } => {
                params.as_ref()
            }
        }
    }

    /// Converts the message into its wire representation.
    pub fn to_wire(&self) -> Request {
        Request::new(
            self.method().as_str(),
            self.params().cloned().map(Value::Object),
            self.id().map(Id::Number),
        )
    }
}

/// Notification asking the server to abandon an in-flight request.
///
/// The protocol defines no response to it: once sent, the client does not wait
/// for any acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationNotification {
    /// Id of the request being cancelled
    pub request_id: i64,
    /// Optional human-readable reason
    pub reason: Option<String>,
}

impl CancellationNotification {
    /// Creates a cancellation for the given request id.
    pub fn new(request_id: i64, reason: Option<String>) -> Self {
        Self { request_id, reason }
    }

    /// Returns the parameters carried on the wire: `requestId` as a string, plus `reason`.
    pub fn params(&self) -> Params {
        let mut params = Params::new();
        params.insert(
            "requestId".to_string(),
            Value::String(self.request_id.to_string()),
        );
        if let Some(reason) = &self.reason {
            params.insert("reason".to_string(), Value::String(reason.clone()));
        }
        params
    }
}

impl From<CancellationNotification> for ClientMessage {
    fn from(notification: CancellationNotification) -> Self {
        ClientMessage::Notification {
            method: ClientMethod::NotificationCancelled,
            params: Some(notification.params()),
        }
    }
}

/// A notification pushed by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerNotification {
    /// Classified notification method
    pub method: ServerNotificationMethod,
    /// Raw parameters
    pub params: Option<Value>,
}

/// A decoded frame received from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// A request initiated by the server that the client must answer.
    Request(Request),
    /// A response to one of the client's requests.
    Response(Response),
    /// A one-way notification from the server.
    Notification(ServerNotification),
}

/// Severity of a server log message, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Detailed debugging information
    Debug,
    /// General informational messages
    Info,
    /// Normal but significant events
    Notice,
    /// Warning conditions
    Warning,
    /// Error conditions
    Error,
    /// Critical conditions
    Critical,
    /// Action must be taken immediately
    Alert,
    /// System is unusable
    Emergency,
}

impl LogLevel {
    /// Returns the wire name of the level.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Notice => "notice",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
            LogLevel::Alert => "alert",
            LogLevel::Emergency => "emergency",
        }
    }

    /// Maps the level onto the closest `tracing` level.
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info | LogLevel::Notice => tracing::Level::INFO,
            LogLevel::Warning => tracing::Level::WARN,
            LogLevel::Error | LogLevel::Critical | LogLevel::Alert | LogLevel::Emergency => {
                tracing::Level::ERROR
            }
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ProtocolError;

    /// Parses a level name case-insensitively. `warn` is accepted for `warning`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "notice" => Ok(LogLevel::Notice),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "critical" => Ok(LogLevel::Critical),
            "alert" => Ok(LogLevel::Alert),
            "emergency" => Ok(LogLevel::Emergency),
            other => Err(ProtocolError::InvalidParams(format!("unknown log level: {}", other))),
        }
    }
}

impl Serialize for LogLevel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A log message pushed by the server through `notifications/message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    /// Severity of the message
    pub level: LogLevel,

    /// Name of the server-side logger, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,

    /// Arbitrary payload, usually a string or an object
    #[serde(default)]
    pub data: Value,
}

impl LogMessage {
    /// Creates a log message without a logger name.
    pub fn new(level: LogLevel, data: impl Into<Value>) -> Self {
        Self {
            level,
            logger: None,
            data: data.into(),
        }
    }

    /// Sets the logger name.
    pub fn with_logger(mut self, logger: impl Into<String>) -> Self {
        self.logger = Some(logger.into());
        self
    }

    /// Decodes the params of a log notification.
    pub fn from_params(params: Option<Value>) -> Result<Self, ProtocolError> {
        let params = params.ok_or_else(|| ProtocolError::MissingField("params".to_string()))?;
        serde_json::from_value(params)
            .map_err(|e| ProtocolError::InvalidParams(format!("invalid log message: {}", e)))
    }
}
