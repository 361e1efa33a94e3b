// Copyright (c) 2025 MCP Link Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! JSON-RPC 2.0 message model for the MCP Link client.
//!
//! This module implements the client half of the
//! [JSON-RPC 2.0 specification](https://www.jsonrpc.org/specification) as used by
//! the Model Context Protocol: building outbound requests and notifications,
//! decoding inbound frames, and correlating responses with the requests that
//! caused them.
//!
//! # Features
//!
//! - Closed set of client methods ([`ClientMethod`]), open set of server notifications
//! - Strict validation of inbound frames, including batches
//! - Request/response correlation with timeouts, cancellation and disconnect fan-out
//! - Standard and MCP specific error codes
//!
//! # Example
//!
//! ```
//! use mcp_link_lib::protocol::jsonrpc::{
//!     codec, ClientMethod, CorrelationTable, InboundMessage,
//! };
//! use serde_json::json;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let table = CorrelationTable::new();
//! let id = table.allocate_id();
//! let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
//! let mut pending = table.register(id, ClientMethod::Ping, deadline).unwrap();
//!
//! // This frame would be written to the server
//! let _frame = codec::encode_request(ClientMethod::Ping, &(), id).unwrap();
//!
//! // ... and this one read back
//! let reply = format!(r#"{{"jsonrpc":"2.0","id":{},"result":{{}}}}"#, id);
//! if let InboundMessage::Response(response) = codec::decode(reply.as_bytes()).unwrap() {
//!     let id = response.id.as_number().unwrap();
//!     table.resolve(id, response.into_outcome());
//! }
//!
//! assert_eq!(pending.wait().await.unwrap(), json!({}));
//! # }
//! ```

pub mod codec;
pub mod correlation;
pub mod error;
pub mod methods;
pub mod types;

#[cfg(test)]
mod tests;

// Re-exports
pub use codec::{decode, decode_frame, encode_notification, encode_request};
pub use correlation::{Completion, CorrelationTable, PendingRequest};
pub use error::{ErrorCode, JsonRpcError};
pub use methods::{ClientMethod, ServerNotificationMethod};
pub use types::{
    CancellationNotification, ClientMessage, Id, InboundMessage, LogLevel, LogMessage, Params,
    Request, Response, ServerNotification,
};
