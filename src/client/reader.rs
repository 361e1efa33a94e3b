//! The inbound reader: one task per connection that routes every frame.
//!
//! | frame                              | destination                         |
//! |------------------------------------|-------------------------------------|
//! | response                           | correlation table                   |
//! | `notifications/message` / `log`    | log dispatcher                      |
//! | `notifications/cancelled`          | logged at debug                     |
//! | other notification                 | discarded with a warning            |
//! | server request                     | server request handler (own task)   |
//! | oversized or malformed             | logged, reported, skipped           |
//!
//! End of input or a read error fails every pending request and ends the task.
//! Frame errors from the transport (an overlong or non-text line) only skip
//! that line.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::logging::LogMessageDispatcher;
use super::outbound::OutboundQueue;
use super::server_requests::{answer, ServerRequestHandler};
use crate::error::{ErrorContext, ErrorReporter, McpError, ProtocolError};
use crate::protocol::jsonrpc::codec::decode_frame;
use crate::protocol::jsonrpc::{
    CorrelationTable, InboundMessage, LogMessage, Response, ServerNotification,
    ServerNotificationMethod,
};
use crate::transport::Transport;

const COMPONENT: &str = "inbound_reader";

/// Everything the reader needs, moved into its task.
pub(crate) struct InboundReader {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) outbound: OutboundQueue,
    pub(crate) table: CorrelationTable,
    pub(crate) logs: Arc<LogMessageDispatcher>,
    pub(crate) server_requests: Arc<RwLock<Arc<dyn ServerRequestHandler>>>,
    pub(crate) reporter: Arc<dyn ErrorReporter>,
    pub(crate) max_message_size: usize,
    pub(crate) shutdown: watch::Receiver<bool>,
}

impl InboundReader {
    /// Reads frames until shutdown, end of input or a transport error.
    pub(crate) async fn run(mut self) {
        debug!("Inbound reader started");

        let reason = loop {
            let frame = tokio::select! {
                biased;
                _ = self.shutdown.changed() => break "client disconnected".to_string(),
                frame = self.transport.receive() => frame,
            };

            match frame {
                Ok(Some(bytes)) => self.handle_frame(&bytes),
                Ok(None) => {
                    info!("Server closed the connection");
                    break "server closed the connection".to_string();
                }
                Err(e) if e.is_frame_error() => {
                    warn!(error = %e, "Skipping unreadable frame");
                    self.reporter.report(ErrorContext::new(e.into(), COMPONENT));
                }
                Err(e) => {
                    error!(error = %e, "Transport read failed");
                    let reason = e.to_string();
                    self.reporter.report(ErrorContext::new(e.into(), COMPONENT));
                    break reason;
                }
            }
        };

        let failed = self.table.fail_all(&reason);
        debug!(failed, reason = %reason, "Inbound reader stopped");
    }

    fn handle_frame(&self, bytes: &[u8]) {
        if bytes.len() > self.max_message_size {
            warn!(
                size = bytes.len(),
                max_size = self.max_message_size,
                "Discarding oversized frame"
            );
            self.report_protocol(ProtocolError::MessageTooLarge {
                size: bytes.len(),
                max_size: self.max_message_size,
            });
            return;
        }

        match decode_frame(bytes) {
            Ok(messages) => {
                for message in messages {
                    match message {
                        Ok(message) => self.route(message),
                        Err(e) => self.report_malformed(e, bytes),
                    }
                }
            }
            Err(e) => self.report_malformed(e, bytes),
        }
    }

    fn route(&self, message: InboundMessage) {
        match message {
            InboundMessage::Response(response) => self.route_response(response),
            InboundMessage::Notification(notification) => self.route_notification(notification),
            InboundMessage::Request(request) => {
                let handler = self.server_requests.read().clone();
                tokio::spawn(answer(handler, self.outbound.clone(), request));
            }
        }
    }

    fn route_response(&self, response: Response) {
        let Some(id) = response.id.as_number() else {
            warn!(id = %response.id, error = ?response.error, "Response without a usable id");
            return;
        };

        if !self.table.resolve(id, response.into_outcome()) {
            debug!(request_id = id, "Dropping response for unknown or completed request");
        }
    }

    fn route_notification(&self, notification: ServerNotification) {
        match notification.method {
            ServerNotificationMethod::LogMessage => {
                match LogMessage::from_params(notification.params) {
                    Ok(message) => {
                        self.logs.dispatch(&message);
                    }
                    Err(e) => {
                        warn!(error = %e, "Invalid log notification");
                        self.report_protocol(e);
                    }
                }
            }
            ServerNotificationMethod::Cancelled => {
                debug!(params = ?notification.params, "Server cancelled one of its requests");
            }
            ServerNotificationMethod::Other(method) => {
                warn!(method = %method, "Discarding unsupported server notification");
            }
        }
    }

    fn report_malformed(&self, error: ProtocolError, bytes: &[u8]) {
        warn!(error = %error, "Skipping malformed frame");
        self.reporter.report(
            ErrorContext::new(McpError::Protocol(error), COMPONENT)
                .with_details(preview(bytes)),
        );
    }

    fn report_protocol(&self, error: ProtocolError) {
        self.reporter
            .report(ErrorContext::new(McpError::Protocol(error), COMPONENT));
    }
}

fn preview(bytes: &[u8]) -> String {
    const MAX_PREVIEW: usize = 200;
    let text = String::from_utf8_lossy(&bytes[..bytes.len().min(MAX_PREVIEW)]);
    if bytes.len() > MAX_PREVIEW {
        format!("{text}...")
    } else {
        text.into_owned()
    }
}
