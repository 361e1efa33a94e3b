// Copyright (c) 2025 MCP Link Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! Method identifiers exchanged with an MCP server.
//!
//! Client-initiated methods form a closed set: the client never sends anything
//! else, and decoding an outbound message with a method outside that set is a
//! protocol error. Server-initiated notification methods are open: servers may
//! introduce new ones at any time, so unknown names are preserved rather than
//! rejected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

/// Method name of the cancellation notification.
pub const NOTIFICATION_CANCELLED: &str = "notifications/cancelled";

/// Method name of the MCP log notification.
pub const NOTIFICATION_LOG_MESSAGE: &str = "notifications/message";

/// Alternate log notification method name accepted from servers.
pub const NOTIFICATION_LOG_ALIAS: &str = "notifications/log";

/// Methods the client may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientMethod {
    /// Session handshake request
    #[serde(rename = "initialize")]
    Initialize,
    /// Liveness check request
    #[serde(rename = "ping")]
    Ping,
    /// List the tools offered by the server
    #[serde(rename = "tools/list")]
    ToolsList,
    /// Invoke a tool
    #[serde(rename = "tools/call")]
    ToolsCall,
    /// List resources
    #[serde(rename = "resources/list")]
    ResourcesList,
    /// Read a resource
    #[serde(rename = "resources/read")]
    ResourcesRead,
    /// List resource templates
    #[serde(rename = "resources/templates/list")]
    ResourcesTemplatesList,
    /// List prompts
    #[serde(rename = "prompts/list")]
    PromptsList,
    /// Fetch a prompt
    #[serde(rename = "prompts/get")]
    PromptsGet,
    /// Change the minimum level of log notifications sent by the server
    #[serde(rename = "logging/setLevel")]
    LoggingSetLevel,
    /// Sent once after a successful `initialize`
    #[serde(rename = "notifications/initialized")]
    NotificationInitialized,
    /// Asks the server to abandon an in-flight request
    #[serde(rename = "notifications/cancelled")]
    NotificationCancelled,
}

impl ClientMethod {
    /// Every client method, in declaration order.
    pub const ALL: [ClientMethod; 12] = [
        ClientMethod::Initialize,
        ClientMethod::Ping,
        ClientMethod::ToolsList,
        ClientMethod::ToolsCall,
        ClientMethod::ResourcesList,
        ClientMethod::ResourcesRead,
        ClientMethod::ResourcesTemplatesList,
        ClientMethod::PromptsList,
        ClientMethod::PromptsGet,
        ClientMethod::LoggingSetLevel,
        ClientMethod::NotificationInitialized,
        ClientMethod::NotificationCancelled,
    ];

    /// Returns the wire name of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientMethod::Initialize => "initialize",
            ClientMethod::Ping => "ping",
            ClientMethod::ToolsList => "tools/list",
            ClientMethod::ToolsCall => "tools/call",
            ClientMethod::ResourcesList => "resources/list",
            ClientMethod::ResourcesRead => "resources/read",
            ClientMethod::ResourcesTemplatesList => "resources/templates/list",
            ClientMethod::PromptsList => "prompts/list",
            ClientMethod::PromptsGet => "prompts/get",
            ClientMethod::LoggingSetLevel => "logging/setLevel",
            ClientMethod::NotificationInitialized => "notifications/initialized",
            ClientMethod::NotificationCancelled => NOTIFICATION_CANCELLED,
        }
    }

    /// Returns true if the method is sent as a notification (no id, no response).
    pub fn is_notification(&self) -> bool {
        matches!(
            self,
            ClientMethod::NotificationInitialized | ClientMethod::NotificationCancelled
        )
    }
}

impl fmt::Display for ClientMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientMethod {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClientMethod::ALL
            .iter()
            .copied()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| ProtocolError::InvalidMethod(s.to_string()))
    }
}

/// Notification methods a server may send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerNotificationMethod {
    /// A log message pushed by the server
    LogMessage,
    /// The server abandoned a request it had sent to the client
    Cancelled,
    /// Any other notification, kept for forward compatibility
    Other(String),
}

impl ServerNotificationMethod {
    /// Classifies a notification method name received from a server.
    pub fn from_wire(method: &str) -> Self {
        match method {
            NOTIFICATION_LOG_MESSAGE | NOTIFICATION_LOG_ALIAS => Self::LogMessage,
            NOTIFICATION_CANCELLED => Self::Cancelled,
            other => Self::Other(other.to_string()),
        }
    }
}
