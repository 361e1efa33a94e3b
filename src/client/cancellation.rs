//! Cancellation of in-flight requests.
//!
//! Cancelling is local first: the waiting caller is completed with
//! [`McpError::Cancelled`] before anything is written, so a stuck or broken
//! transport can never keep it waiting. The `notifications/cancelled` message
//! that follows is queued for the outbound writer; it is best-effort and has no
//! response. Nothing here awaits.

use tracing::{debug, warn};

use super::outbound::OutboundQueue;
use crate::error::{McpError, McpResult};
use crate::protocol::jsonrpc::codec::encode_message;
use crate::protocol::jsonrpc::{CancellationNotification, CorrelationTable};

/// Cancels pending requests and tells the server about it.
#[derive(Clone)]
pub struct CancellationDispatcher {
    table: CorrelationTable,
    outbound: OutboundQueue,
}

impl std::fmt::Debug for CancellationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationDispatcher")
            .field("pending", &self.table.len())
            .finish()
    }
}

impl CancellationDispatcher {
    pub(crate) fn new(table: CorrelationTable, outbound: OutboundQueue) -> Self {
        Self { table, outbound }
    }

    /// Cancels request `id`.
    ///
    /// Returns false, and sends nothing, when no such request is pending. A
    /// notification that cannot be queued is logged and does not change the result.
    pub fn cancel(&self, id: i64, reason: Option<&str>) -> bool {
        let reason = reason.map(str::to_string);

        if !self.table.cancel_local(id, reason.clone()) {
            debug!(request_id = id, "Cancel requested for unknown or completed request");
            return false;
        }

        if let Err(e) = self.notify_server(id, reason) {
            warn!(request_id = id, error = %e, "Failed to send cancellation notification");
        }
        true
    }

    /// Queues `notifications/cancelled` for `id` without touching the table.
    pub fn notify_server(&self, id: i64, reason: Option<String>) -> McpResult<()> {
        let notification = CancellationNotification::new(id, reason);
        let frame = encode_message(&notification.into())?;

        debug!(request_id = id, "Sending cancellation notification");
        self.outbound.push(frame).map_err(McpError::from)
    }
}
