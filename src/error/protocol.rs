//! Protocol error module.
//!
//! This module defines error types raised while decoding or validating
//! JSON-RPC frames received from an MCP server.

use thiserror::Error;

/// Errors that can occur during protocol operations.
///
/// Protocol errors describe a single bad frame. The inbound reader logs them and
/// moves on to the next frame; they never end a session.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Error when the frame is not valid JSON.
    #[error("Malformed JSON frame: {0}")]
    MalformedJson(String),

    /// Error when the JSON-RPC message is invalid.
    #[error("Invalid JSON-RPC message: {0}")]
    InvalidMessage(String),

    /// Error when an outbound-only message carries an unrecognized method.
    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    /// Error when the JSON-RPC message has invalid parameters.
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Error when the protocol version is unsupported.
    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    /// Error when a required field is missing from the message.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Error when the message exceeds the maximum allowed size.
    #[error("Message size exceeds maximum allowed: {size} > {max_size}")]
    MessageTooLarge {
        /// The actual size of the message in bytes
        size: usize,
        /// The maximum allowed size in bytes
        max_size: usize,
    },

    /// Error during protocol initialization.
    #[error("Initialization error: {0}")]
    InitializationError(String),
}
