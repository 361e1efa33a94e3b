//! The outbound writer: one task per connection that owns every write.
//!
//! Callers only enqueue frames, so starting a request, cancelling one or
//! answering the server never waits on a peer that stopped reading. Frames are
//! written in the order they were queued. A request frame whose caller has
//! already given up (cancelled, timed out, dropped) is skipped.
//!
//! A failed write is connection-level: every pending request fails and the
//! queue closes. On shutdown the writer stops once the queue is empty.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error};

use crate::error::{ErrorContext, ErrorReporter, TransportError};
use crate::protocol::jsonrpc::CorrelationTable;
use crate::transport::Transport;

const COMPONENT: &str = "outbound_writer";

/// One encoded frame waiting to be written.
#[derive(Debug)]
pub(crate) struct OutboundFrame {
    pub(crate) request_id: Option<i64>,
    pub(crate) bytes: Vec<u8>,
}

/// Sending side of the writer queue. Enqueueing never blocks.
#[derive(Debug, Clone)]
pub(crate) struct OutboundQueue {
    tx: mpsc::UnboundedSender<OutboundFrame>,
}

impl OutboundQueue {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<OutboundFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queues the frame of request `id`.
    pub(crate) fn push_request(&self, id: i64, bytes: Vec<u8>) -> Result<(), TransportError> {
        self.push_frame(OutboundFrame {
            request_id: Some(id),
            bytes,
        })
    }

    /// Queues a notification or a response.
    pub(crate) fn push(&self, bytes: Vec<u8>) -> Result<(), TransportError> {
        self.push_frame(OutboundFrame {
            request_id: None,
            bytes,
        })
    }

    fn push_frame(&self, frame: OutboundFrame) -> Result<(), TransportError> {
        self.tx.send(frame).map_err(|_| TransportError::Closed)
    }
}

/// Everything the writer needs, moved into its task.
pub(crate) struct OutboundWriter {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) table: CorrelationTable,
    pub(crate) reporter: Arc<dyn ErrorReporter>,
    pub(crate) frames: mpsc::UnboundedReceiver<OutboundFrame>,
    pub(crate) shutdown: watch::Receiver<bool>,
}

impl OutboundWriter {
    /// Writes queued frames until shutdown, the queue closes or a write fails.
    pub(crate) async fn run(mut self) {
        debug!("Outbound writer started");

        loop {
            let frame = tokio::select! {
                biased;
                frame = self.frames.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
                _ = self.shutdown.changed() => break,
            };

            if let Some(id) = frame.request_id {
                if !self.table.contains(id) {
                    debug!(request_id = id, "Skipping request abandoned before it was written");
                    continue;
                }
            }

            if let Err(e) = self.transport.send(frame.bytes).await {
                error!(error = %e, "Transport write failed");
                let reason = e.to_string();
                self.reporter.report(ErrorContext::new(e.into(), COMPONENT));
                self.table.fail_all(&reason);
                break;
            }
        }

        // Later pushes fail with `Closed`
        self.frames.close();
        debug!("Outbound writer stopped");
    }
}
