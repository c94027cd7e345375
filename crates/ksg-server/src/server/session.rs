//! Protocol session handler.
//!
//! Each session drives one request/response conversation over a byte
//! stream:
//! - Sends the banner, then a prompt before every read
//! - Parses each line into a [`Request`]
//! - Answers from the shared [`SensorRegistry`]
//! - Ends on `quit`, end-of-input, or a stream error
//!
//! Sensor read failures never end a session. The client simply gets no
//! reply line and the failure is logged here.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Stream errors end only the session they occur in

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter,
};
use tokio::time::timeout;
use tracing::{debug, error, warn};

use ksg_core::{Sensor, SensorRegistry, SensorResult};
use ksg_protocol::{banner, info_line, monitor_line, value_line, Request, PROMPT};

/// Longest line in bytes, excluding the newline, that is matched against
/// commands. Anything longer is discarded and treated as a blank line.
pub const MAX_LINE_LENGTH: usize = 65536;

/// Write timeout (10 seconds)
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// How a session finished without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Client sent `quit`
    Quit,

    /// Peer closed its side of the stream
    EndOfInput,
}

/// Line-protocol session over a single stream.
pub struct SessionHandler<R, W> {
    /// Buffered reader for incoming lines
    reader: BufReader<R>,

    /// Buffered writer for replies
    writer: BufWriter<W>,

    /// Shared, read-only sensor registry
    registry: Arc<SensorRegistry>,

    /// Label used in log output
    peer: String,
}

impl<R, W> SessionHandler<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a new session handler.
    ///
    /// # Arguments
    ///
    /// * `reader` - Readable side of the stream
    /// * `writer` - Writable side of the stream
    /// * `registry` - Registry shared with all other sessions
    /// * `peer` - Label identifying the client in logs
    pub fn new(reader: R, writer: W, registry: Arc<SensorRegistry>, peer: impl Into<String>) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
            registry,
            peer: peer.into(),
        }
    }

    /// Runs the session until `quit`, end-of-input or a stream error.
    pub async fn run(mut self) -> Result<SessionEnd, SessionError> {
        debug!(peer = %self.peer, "Session started");

        self.write(&format!("{}\n", banner())).await?;
        self.prompt().await?;

        loop {
            let line = match self.read_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!(peer = %self.peer, "Client sent EOF");
                    self.farewell().await;
                    return Ok(SessionEnd::EndOfInput);
                }
                Err(e) => {
                    self.farewell().await;
                    return Err(e);
                }
            };

            debug!(peer = %self.peer, line = %line.trim(), "Input was");

            let request = Request::parse(&line);
            if request == Request::Quit {
                self.close().await?;
                return Ok(SessionEnd::Quit);
            }

            self.handle_request(request).await?;
            self.prompt().await?;
        }
    }

    /// Answers a single request. Unknown sensors produce no output.
    async fn handle_request(&mut self, request: Request<'_>) -> Result<(), SessionError> {
        match request {
            Request::Empty | Request::Quit => {}

            Request::Monitors => {
                let listing: String = self
                    .registry
                    .iter()
                    .map(|s| monitor_line(s.name(), s.value_type()))
                    .collect();
                self.write(&listing).await?;
            }

            Request::Value(name) => {
                let Some(sensor) = self.registry.lookup(name) else {
                    return Ok(());
                };

                match read_off_thread(sensor, |s| s.value()).await {
                    Some(Ok(value)) => self.write(&value_line(&value)).await?,
                    Some(Err(e)) => {
                        warn!(peer = %self.peer, sensor = %name, error = %e, "Sensor read failed");
                    }
                    None => {}
                }
            }

            Request::Info(name) => {
                let Some(sensor) = self.registry.lookup(name) else {
                    return Ok(());
                };

                let bounds = read_off_thread(Arc::clone(&sensor), |s| (s.min(), s.max())).await;
                let (min, max) = match bounds {
                    Some((min, max)) => (
                        self.field_or_empty(name, "min", min),
                        self.field_or_empty(name, "max", max),
                    ),
                    None => (String::new(), String::new()),
                };

                let line = info_line(sensor.description(), &min, &max, sensor.units());
                self.write(&line).await?;
            }
        }

        Ok(())
    }

    /// Unwraps a bound reading, logging and blanking it on failure.
    fn field_or_empty(&self, name: &str, field: &str, reading: SensorResult<String>) -> String {
        reading.unwrap_or_else(|e| {
            warn!(peer = %self.peer, sensor = %name, field, error = %e, "Sensor bound read failed");
            String::new()
        })
    }

    /// Writes the trailing newline on the way out. The peer may already be
    /// gone, so failures are ignored.
    async fn farewell(&mut self) {
        if self.write("\n").await.is_ok() {
            let _ = self.flush().await;
        }
    }

    /// Reads one line. Returns `None` at end-of-input.
    ///
    /// Bytes are decoded lossily so stray non-UTF-8 input cannot end the
    /// session. A line over [`MAX_LINE_LENGTH`] is drained and returned as
    /// an empty line, which no command matches.
    async fn read_line(&mut self) -> Result<Option<String>, SessionError> {
        let mut buf = Vec::new();

        if self.read_chunk(&mut buf).await? == 0 {
            return Ok(None);
        }

        if buf.last() != Some(&b'\n') && buf.len() > MAX_LINE_LENGTH {
            warn!(peer = %self.peer, max = MAX_LINE_LENGTH, "Discarding over-long line");
            loop {
                buf.clear();
                if self.read_chunk(&mut buf).await? == 0 || buf.last() == Some(&b'\n') {
                    break;
                }
            }
            return Ok(Some(String::new()));
        }

        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    /// Reads up to one newline, but never more than `MAX_LINE_LENGTH + 1`
    /// bytes.
    async fn read_chunk(&mut self, buf: &mut Vec<u8>) -> Result<usize, SessionError> {
        let limit = MAX_LINE_LENGTH as u64 + 1;
        (&mut self.reader)
            .take(limit)
            .read_until(b'\n', buf)
            .await
            .map_err(|e| SessionError::Io(e.to_string()))
    }

    /// Writes the prompt and flushes everything queued before it.
    async fn prompt(&mut self) -> Result<(), SessionError> {
        self.write(PROMPT).await?;
        self.flush().await
    }

    async fn write(&mut self, text: &str) -> Result<(), SessionError> {
        match timeout(WRITE_TIMEOUT, self.writer.write_all(text.as_bytes())).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SessionError::Io(e.to_string())),
            Err(_) => Err(SessionError::WriteTimeout),
        }
    }

    async fn flush(&mut self) -> Result<(), SessionError> {
        match timeout(WRITE_TIMEOUT, self.writer.flush()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SessionError::Io(e.to_string())),
            Err(_) => Err(SessionError::WriteTimeout),
        }
    }

    /// Flushes and closes the writable side of the stream.
    async fn close(&mut self) -> Result<(), SessionError> {
        debug!(peer = %self.peer, "Client requested quit");
        match timeout(WRITE_TIMEOUT, self.writer.shutdown()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SessionError::Io(e.to_string())),
            Err(_) => Err(SessionError::WriteTimeout),
        }
    }
}

/// Runs a sensor read on the blocking pool so a slow backend stalls only
/// the session waiting on it.
async fn read_off_thread<T, F>(sensor: Arc<dyn Sensor>, read: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn Sensor) -> T + Send + 'static,
{
    match tokio::task::spawn_blocking(move || read(sensor.as_ref())).await {
        Ok(result) => Some(result),
        Err(e) => {
            error!(error = %e, "Sensor read task failed");
            None
        }
    }
}

/// Errors that end a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Write timeout")]
    WriteTimeout,
}
