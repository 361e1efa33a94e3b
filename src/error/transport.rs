//! Transport error module.
//!
//! This module defines error types that may occur on the channel between the
//! client and an MCP server: process spawning, frame reads and frame writes.

use std::io;
use thiserror::Error;

/// Errors that can occur during transport operations.
///
/// Apart from the frame errors ([`is_frame_error`](Self::is_frame_error)), these
/// errors are connection-level: when the inbound reader observes one, every
/// request still awaiting a response is failed with it.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Error when the server process could not be started.
    #[error("Failed to spawn MCP server process: {0}")]
    SpawnError(String),

    /// Error when reading a frame from the server.
    #[error("Transport read error: {0}")]
    ReadError(#[from] io::Error),

    /// Error when writing a frame to the server.
    #[error("Transport write error: {0}")]
    WriteError(String),

    /// The connection was lost while requests were still in flight.
    #[error("Connection to MCP server lost: {0}")]
    Disconnected(String),

    /// An inbound line exceeded the frame size limit. The rest of the line is discarded.
    #[error("Inbound frame exceeds maximum size of {max_size} bytes")]
    FrameTooLarge { max_size: usize },

    /// An inbound line could not be read as text.
    #[error("Invalid inbound frame: {0}")]
    InvalidFrame(String),

    /// Error when the transport is closed.
    #[error("Transport closed")]
    Closed,

    /// Other transport errors.
    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Returns true if only the current frame was lost and the connection is still usable.
    pub fn is_frame_error(&self) -> bool {
        matches!(self, Self::FrameTooLarge { .. } | Self::InvalidFrame(_))
    }
}
