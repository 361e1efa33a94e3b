//! Requests initiated by the server.
//!
//! MCP servers may call back into the client (`ping`, `roots/list`,
//! `sampling/createMessage`, ...). Each request must be answered with a response
//! carrying the same id, otherwise the server may wait forever. Unless the
//! application installs its own [`ServerRequestHandler`], the client answers
//! `ping` and rejects everything else with "Method not found".

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::outbound::OutboundQueue;
use crate::protocol::jsonrpc::codec::encode_response;
use crate::protocol::jsonrpc::{Id, JsonRpcError, Request, Response};

/// Answers requests sent by the server.
#[async_trait]
pub trait ServerRequestHandler: Send + Sync {
    /// Produces the result, or error object, for one server request.
    async fn handle_request(&self, method: &str, params: Option<Value>) -> Result<Value, JsonRpcError>;
}

/// Handler used when the application did not install one.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultServerRequestHandler;

#[async_trait]
impl ServerRequestHandler for DefaultServerRequestHandler {
    async fn handle_request(&self, method: &str, _params: Option<Value>) -> Result<Value, JsonRpcError> {
        match method {
            "ping" => Ok(json!({})),
            other => Err(JsonRpcError::method_not_found(other)),
        }
    }
}

/// Runs `handler` for `request` and queues the response.
pub(crate) async fn answer(
    handler: Arc<dyn ServerRequestHandler>,
    outbound: OutboundQueue,
    request: Request,
) {
    let id = request.id.clone().unwrap_or(Id::Null);
    debug!(server_request_id = %id, method = %request.method, "Handling server request");

    let response = match handler.handle_request(&request.method, request.params).await {
        Ok(result) => Response::success(id, result),
        Err(error) => Response::error(id, error),
    };

    let frame = match encode_response(&response) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "Failed to encode response to server request");
            return;
        }
    };

    if let Err(e) = outbound.push(frame) {
        warn!(error = %e, "Failed to answer server request");
    }
}
