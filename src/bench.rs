//! Benchmarking module for MCP Link.
//!
//! Fixtures for the criterion benchmarks of the hot paths: frame encoding,
//! frame decoding and request correlation.

use serde_json::{json, Value};

/// Builds request params of roughly `payload_bytes` bytes.
pub fn sample_params(payload_bytes: usize) -> Value {
    json!({
        "name": "echo",
        "arguments": { "text": "x".repeat(payload_bytes) }
    })
}

/// Builds a response frame for request `id` carrying roughly `payload_bytes` bytes.
pub fn sample_response_frame(id: i64, payload_bytes: usize) -> Vec<u8> {
    let frame = json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": {
            "content": [{ "type": "text", "text": "x".repeat(payload_bytes) }]
        }
    });
    frame.to_string().into_bytes()
}

/// Builds a batch frame answering requests `1..=count`.
pub fn sample_batch_frame(count: i64) -> Vec<u8> {
    let responses: Vec<Value> = (1..=count)
        .map(|id| json!({ "jsonrpc": "2.0", "id": id, "result": {} }))
        .collect();
    Value::Array(responses).to_string().into_bytes()
}

/// Builds a log notification frame.
pub fn sample_log_frame() -> Vec<u8> {
    json!({
        "jsonrpc": "2.0",
        "method": "notifications/message",
        "params": { "level": "info", "logger": "bench", "data": { "step": 1 } }
    })
    .to_string()
    .into_bytes()
}
