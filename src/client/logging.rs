//! Delivery of server log notifications.
//!
//! Servers push `notifications/message` at any time. The inbound reader decodes
//! each one into a [`LogMessage`] and hands it to the [`LogMessageDispatcher`],
//! which invokes the single registered [`LogMessageHandler`]. A failing handler
//! is reported and otherwise ignored; the reader keeps running.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::error::{ErrorContext, ErrorReporter, McpError};
use crate::protocol::jsonrpc::{LogLevel, LogMessage};

/// Error type returned by log handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Receives log messages pushed by the server.
pub trait LogMessageHandler: Send + Sync {
    /// Handles one log message.
    fn handle_log_message(&self, message: &LogMessage) -> Result<(), HandlerError>;
}

impl<F> LogMessageHandler for F
where
    F: Fn(&LogMessage) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle_log_message(&self, message: &LogMessage) -> Result<(), HandlerError> {
        self(message)
    }
}

/// Forwards server log messages into `tracing`.
///
/// Levels are mapped with [`LogLevel::to_tracing_level`]; `notice` becomes `info`
/// and everything above `error` becomes `error`.
#[derive(Debug, Default, Clone)]
pub struct TracingLogHandler {
    server: Option<String>,
}

impl TracingLogHandler {
    /// Creates a handler that tags every event with the server name.
    pub fn for_server(server: impl Into<String>) -> Self {
        Self {
            server: Some(server.into()),
        }
    }
}

/// `tracing` target for log messages forwarded from the server.
pub const SERVER_LOG_TARGET: &str = "mcp_link::server_log";

impl LogMessageHandler for TracingLogHandler {
    fn handle_log_message(&self, message: &LogMessage) -> Result<(), HandlerError> {
        let server = self.server.as_deref().unwrap_or("");
        let logger = message.logger.as_deref().unwrap_or("");
        let data = match &message.data {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        };

        match message.level {
            LogLevel::Debug => {
                tracing::debug!(target: SERVER_LOG_TARGET, server, logger, "{}", data)
            }
            LogLevel::Info | LogLevel::Notice => {
                tracing::info!(target: SERVER_LOG_TARGET, server, logger, "{}", data)
            }
            LogLevel::Warning => {
                tracing::warn!(target: SERVER_LOG_TARGET, server, logger, "{}", data)
            }
            LogLevel::Error | LogLevel::Critical | LogLevel::Alert | LogLevel::Emergency => {
                tracing::error!(
                    target: SERVER_LOG_TARGET,
                    server,
                    logger,
                    level = %message.level,
                    "{}",
                    data
                )
            }
        }
        Ok(())
    }
}

/// Holds the active log handler and shields the reader from its failures.
pub struct LogMessageDispatcher {
    handler: RwLock<Option<Arc<dyn LogMessageHandler>>>,
    reporter: Arc<dyn ErrorReporter>,
}

impl fmt::Debug for LogMessageDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogMessageDispatcher")
            .field("has_handler", &self.has_handler())
            .field("reporter", &self.reporter)
            .finish()
    }
}

impl LogMessageDispatcher {
    /// Creates a dispatcher with no handler.
    pub fn new(reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            handler: RwLock::new(None),
            reporter,
        }
    }

    /// Replaces the active handler, or clears it with `None`.
    pub fn set_handler(&self, handler: Option<Arc<dyn LogMessageHandler>>) {
        *self.handler.write() = handler;
    }

    /// Returns true if a handler is registered.
    pub fn has_handler(&self) -> bool {
        self.handler.read().is_some()
    }

    /// Passes `message` to the active handler.
    ///
    /// Returns true if the handler accepted the message. Without a handler the
    /// message is dropped. Handler errors and panics are logged and reported,
    /// never propagated.
    pub fn dispatch(&self, message: &LogMessage) -> bool {
        // Clone out of the lock so a handler can replace itself
        let handler = self.handler.read().clone();
        let Some(handler) = handler else {
            trace!(level = %message.level, "No log handler registered, dropping message");
            return false;
        };

        match catch_unwind(AssertUnwindSafe(|| handler.handle_log_message(message))) {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = %e, level = %message.level, "Log handler failed");
                self.reporter.report(
                    ErrorContext::new(McpError::Custom(e.to_string()), "log_dispatcher")
                        .with_details(format!("level={}", message.level)),
                );
                false
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                warn!(panic = %reason, level = %message.level, "Log handler panicked");
                self.reporter.report(
                    ErrorContext::new(
                        McpError::Custom(format!("log handler panicked: {reason}")),
                        "log_dispatcher",
                    )
                    .with_details(format!("level={}", message.level)),
                );
                debug!("Continuing after log handler panic");
                false
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TracingErrorReporter;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct RecordingReporter {
        components: Mutex<Vec<String>>,
    }

    impl ErrorReporter for RecordingReporter {
        fn report(&self, context: ErrorContext) {
            self.components.lock().push(context.component);
        }
    }

    fn message() -> LogMessage {
        LogMessage::new(LogLevel::Info, json!("indexing done")).with_logger("indexer")
    }

    #[test]
    fn test_dispatch_without_handler_drops_message() {
        let dispatcher = LogMessageDispatcher::new(Arc::new(TracingErrorReporter));
        assert!(!dispatcher.has_handler());
        assert!(!dispatcher.dispatch(&message()));
    }

    #[test]
    fn test_closure_handler_receives_message() {
        let dispatcher = LogMessageDispatcher::new(Arc::new(TracingErrorReporter));
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);

        dispatcher.set_handler(Some(Arc::new(move |message: &LogMessage| -> Result<(), HandlerError> {
            sink.lock().push(message.clone());
            Ok(())
        })));

        assert!(dispatcher.dispatch(&message()));
        let received = received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].logger.as_deref(), Some("indexer"));
    }

    #[test]
    fn test_set_handler_replaces_and_clears() {
        let dispatcher = LogMessageDispatcher::new(Arc::new(TracingErrorReporter));
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&first);
        dispatcher.set_handler(Some(Arc::new(move |_: &LogMessage| -> Result<(), HandlerError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })));
        dispatcher.dispatch(&message());

        let counter = Arc::clone(&second);
        dispatcher.set_handler(Some(Arc::new(move |_: &LogMessage| -> Result<(), HandlerError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })));
        dispatcher.dispatch(&message());

        dispatcher.set_handler(None);
        assert!(!dispatcher.dispatch(&message()));

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_error_is_reported() {
        let reporter = Arc::new(RecordingReporter::default());
        let dispatcher = LogMessageDispatcher::new(reporter.clone());
        dispatcher.set_handler(Some(Arc::new(|_: &LogMessage| -> Result<(), HandlerError> {
            Err("disk full".into())
        })));

        assert!(!dispatcher.dispatch(&message()));
        assert_eq!(*reporter.components.lock(), vec!["log_dispatcher".to_string()]);
    }

    #[test]
    fn test_handler_panic_is_contained() {
        let reporter = Arc::new(RecordingReporter::default());
        let dispatcher = LogMessageDispatcher::new(reporter.clone());
        dispatcher.set_handler(Some(Arc::new(|_: &LogMessage| -> Result<(), HandlerError> {
            panic!("handler bug")
        })));

        assert!(!dispatcher.dispatch(&message()));
        assert!(!dispatcher.dispatch(&message()));
        assert_eq!(reporter.components.lock().len(), 2);
    }

    #[test]
    fn test_tracing_handler_accepts_every_level() {
        let handler = TracingLogHandler::for_server("test-server");
        for level in [
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Notice,
            LogLevel::Warning,
            LogLevel::Error,
            LogLevel::Critical,
            LogLevel::Alert,
            LogLevel::Emergency,
        ] {
            let message = LogMessage::new(level, json!({"detail": 1}));
            assert!(handler.handle_log_message(&message).is_ok());
        }
    }
}
