//! Newline-delimited JSON transport over a pair of byte streams.
//!
//! Inbound lines are framed with a length-limited [`LinesCodec`], so a server
//! that never sends a newline cannot grow the read buffer past the frame limit.

use std::io;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::{Transport, TRAFFIC_TARGET};
use crate::error::TransportError;

/// Default inbound frame limit, matching `ClientConfig::max_message_size`.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 10 * 1024 * 1024;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Reads newline-terminated lines, discarding any line longer than the limit.
struct LineReader {
    io: BoxedReader,
    buf: BytesMut,
    codec: LinesCodec,
    eof: bool,
}

impl LineReader {
    fn new(io: BoxedReader, max_frame_size: usize) -> Self {
        Self {
            io,
            buf: BytesMut::with_capacity(8 * 1024),
            codec: LinesCodec::new_with_max_length(max_frame_size),
            eof: false,
        }
    }

    /// Returns the next line without its terminator, or `None` at end of input.
    ///
    /// Cancel safe: bytes already read stay buffered for the next call.
    async fn next_line(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            let decoded = if self.eof {
                self.codec.decode_eof(&mut self.buf)
            } else {
                self.codec.decode(&mut self.buf)
            };

            match decoded {
                Ok(Some(line)) => return Ok(Some(line)),
                Ok(None) if self.eof => return Ok(None),
                Ok(None) => {}
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    return Err(TransportError::FrameTooLarge {
                        max_size: self.codec.max_length(),
                    });
                }
                Err(LinesCodecError::Io(e)) if e.kind() == io::ErrorKind::InvalidData => {
                    return Err(TransportError::InvalidFrame(e.to_string()));
                }
                Err(LinesCodecError::Io(e)) => return Err(TransportError::ReadError(e)),
            }

            if self.io.read_buf(&mut self.buf).await? == 0 {
                self.eof = true;
            }
        }
    }
}

/// A transport that exchanges one JSON document per line over async streams.
///
/// Used directly over a child's stdout/stdin, and over in-memory pipes in tests.
/// [`close`](Transport::close) aborts a write that is blocked on a peer that
/// stopped reading.
pub struct StdioTransport {
    reader: Mutex<LineReader>,
    writer: Mutex<Option<BoxedWriter>>,
    closing: CancellationToken,
}

impl std::fmt::Debug for StdioTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioTransport")
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl StdioTransport {
    /// Creates a transport reading frames from `read` and writing them to `write`.
    pub fn with_streams<R, W>(read: R, write: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            reader: Mutex::new(LineReader::new(Box::new(read), DEFAULT_MAX_FRAME_SIZE)),
            writer: Mutex::new(Some(Box::new(write))),
            closing: CancellationToken::new(),
        }
    }

    /// Sets the longest inbound line accepted, in bytes.
    ///
    /// Longer lines are skipped without being buffered and reported as
    /// [`TransportError::FrameTooLarge`].
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        let reader = self.reader.get_mut();
        reader.codec = LinesCodec::new_with_max_length(max_frame_size);
        self
    }

    /// Returns true once [`Transport::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closing.is_cancelled()
    }
}

async fn write_frame(writer: &mut BoxedWriter, frame: &[u8]) -> Result<(), TransportError> {
    writer
        .write_all(frame)
        .await
        .map_err(|e| TransportError::WriteError(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| TransportError::WriteError(e.to_string()))
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&self, mut frame: Vec<u8>) -> Result<(), TransportError> {
        if frame.contains(&b'\n') {
            return Err(TransportError::WriteError(
                "frame contains a newline".to_string(),
            ));
        }

        let mut guard = tokio::select! {
            guard = self.writer.lock() => guard,
            _ = self.closing.cancelled() => return Err(TransportError::Closed),
        };
        let writer = guard.as_mut().ok_or(TransportError::Closed)?;

        trace!(target: TRAFFIC_TARGET, "> {}", String::from_utf8_lossy(&frame));

        frame.push(b'\n');
        tokio::select! {
            result = write_frame(writer, &frame) => result,
            _ = self.closing.cancelled() => {
                debug!(bytes = frame.len(), "Write aborted by close");
                Err(TransportError::Closed)
            }
        }
    }

    async fn receive(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut reader = tokio::select! {
            reader = self.reader.lock() => reader,
            _ = self.closing.cancelled() => return Ok(None),
        };

        loop {
            let line = tokio::select! {
                line = reader.next_line() => line?,
                _ = self.closing.cancelled() => return Ok(None),
            };

            let Some(line) = line else {
                debug!("EOF reached on transport input");
                return Ok(None);
            };

            if line.trim().is_empty() {
                continue;
            }

            trace!(target: TRAFFIC_TARGET, "< {}", line);
            return Ok(Some(line.into_bytes()));
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        // Wakes any send still holding the writer
        self.closing.cancel();

        // Dropping the writer closes the server's input
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                warn!(error = %e, "Shutting down transport output failed");
                return Err(TransportError::WriteError(e.to_string()));
            }
        }
        Ok(())
    }
}
