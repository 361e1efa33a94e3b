//! Protocol module for the MCP Link client.
//!
//! This module implements the wire protocol spoken with MCP servers: JSON-RPC 2.0
//! messages, their encoding, and request/response correlation.

pub mod jsonrpc;
