//! Transport module for the MCP Link client.
//!
//! A transport moves complete JSON-RPC frames between the client and one MCP
//! server. The client core only sees the [`Transport`] trait; framing (newline
//! delimited on stdio) and process management stay behind it.

use async_trait::async_trait;

use crate::error::TransportError;

pub mod process;
pub mod stdio;

pub use process::ChildProcessTransport;
pub use stdio::StdioTransport;

/// `tracing` target used for raw frame logging.
///
/// Enable with `RUST_LOG=mcp_link::traffic=trace`. Outbound frames are prefixed
/// with `>`, inbound frames with `<`.
pub const TRAFFIC_TARGET: &str = "mcp_link::traffic";

/// A bidirectional channel of JSON-RPC frames.
///
/// `send` may be called concurrently from many tasks; implementations serialize
/// writes so frames never interleave. `receive` is only ever called by the single
/// inbound reader of a connection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Writes one complete frame.
    async fn send(&self, frame: Vec<u8>) -> Result<(), TransportError>;

    /// Reads the next frame. `Ok(None)` means the server closed the channel.
    async fn receive(&self) -> Result<Option<Vec<u8>>, TransportError>;

    /// Closes the channel. Further sends fail with [`TransportError::Closed`].
    async fn close(&self) -> Result<(), TransportError>;
}
