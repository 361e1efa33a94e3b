//! MCP Link Library
//!
//! This library contains the client core of MCP Link: the JSON-RPC message
//! model, request/response correlation, cancellation, delivery of server log
//! messages, and the transports that carry frames to and from an MCP server.
//!
//! # Architecture
//!
//! - [`protocol::jsonrpc`] encodes and decodes frames and owns the correlation table
//! - [`transport`] moves newline-delimited frames over stdio or a child process
//! - [`client`] ties both together behind [`client::McpClient`]
//! - [`config`] and [`error`] are shared by every layer
//!
//! One inbound reader task per connection routes every frame it reads; callers
//! never read from the transport themselves.

// Re-export public modules
pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod transport;

// Internal modules that are not part of the public API
#[cfg(test)]
pub(crate) mod tests;

// Feature-gated modules
#[cfg(feature = "benchmarking")]
pub mod bench;

pub use client::McpClient;
pub use error::{McpError, McpResult};

/// Version information for MCP Link.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
