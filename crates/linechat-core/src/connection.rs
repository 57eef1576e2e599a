//! Line-oriented TCP connection
//!
//! A [`Connection`] owns one TCP socket split into a buffered line reader and a
//! line writer. Both halves sit behind async mutexes, so concurrent senders are
//! serialized and never interleave partial lines. Closing flips a watch flag first,
//! which wakes any pending read or write, and then releases both halves.

use core::fmt;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tracing::{debug, trace};

use crate::config::Endpoint;
use crate::error::{ChatError, ChatResult};
use crate::types::ConnectionId;

/// Longest inbound line accepted, terminator excluded
pub const MAX_LINE_BYTES: usize = 64 * 1024;

// ----------------------------------------------------------------------------
// Connection
// ----------------------------------------------------------------------------

/// An open, line-oriented connection to the chat server
pub struct Connection {
    id: ConnectionId,
    endpoint: Endpoint,
    /// Present iff the socket is open
    reader: Mutex<Option<BufReader<OwnedReadHalf>>>,
    /// Present iff the socket is open
    writer: Mutex<Option<BufWriter<OwnedWriteHalf>>>,
    closed: watch::Sender<bool>,
}

impl Connection {
    /// Open a TCP connection to `endpoint`
    ///
    /// Without a `connect_timeout` the dial waits as long as the OS does.
    pub async fn dial(endpoint: &Endpoint, connect_timeout: Option<Duration>) -> ChatResult<Self> {
        let addr = endpoint.to_string();
        let connect = TcpStream::connect((endpoint.host.as_str(), endpoint.port));

        let result = match connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connect).await.map_err(|_| {
                ChatError::ConnectTimeout {
                    addr: addr.clone(),
                    timeout_ms: limit.as_millis() as u64,
                }
            })?,
            None => connect.await,
        };

        let stream = result.map_err(|source| ChatError::ConnectFailed {
            addr: addr.clone(),
            source,
        })?;

        Self::from_stream(endpoint.clone(), stream)
    }

    /// Wrap an already-connected stream with line adapters
    ///
    /// A socket that is no longer connected at this point is reported as a connect
    /// failure so the reconnect loop retries it.
    pub fn from_stream(endpoint: Endpoint, stream: TcpStream) -> ChatResult<Self> {
        stream
            .peer_addr()
            .map_err(|source| ChatError::ConnectFailed {
                addr: endpoint.to_string(),
                source,
            })?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY for {}: {}", endpoint, e);
        }

        let (read_half, write_half) = stream.into_split();
        let (closed, _) = watch::channel(false);
        let id = ConnectionId::next();

        debug!(connection = %id, "Connection established to {}", endpoint);

        Ok(Self {
            id,
            endpoint,
            reader: Mutex::new(Some(BufReader::new(read_half))),
            writer: Mutex::new(Some(BufWriter::new(write_half))),
            closed,
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Write `text` followed by a newline and flush it
    ///
    /// `text` must not contain a newline itself; no escaping is done.
    pub async fn send_line(&self, text: &str) -> ChatResult<()> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(ChatError::Closed);
        }

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(ChatError::Closed)?;

        let write = async {
            writer.write_all(text.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        };

        tokio::select! {
            result = write => {
                result.map_err(ChatError::WriteFailed)?;
                trace!(connection = %self.id, bytes = text.len() + 1, "Line written");
                Ok(())
            }
            _ = wait_closed(&mut closed) => Err(ChatError::Closed),
        }
    }

    /// Wait for the next complete line
    ///
    /// Returns `Ok(None)` when the peer closed the stream or when the connection was
    /// closed locally while waiting. The line terminator (`\n` or `\r\n`) is stripped.
    /// A final unterminated line before end of stream is still returned. Invalid UTF-8
    /// is replaced with U+FFFD; a line longer than [`MAX_LINE_BYTES`] is a read failure.
    pub async fn read_line(&self) -> ChatResult<Option<String>> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(ChatError::Closed);
        }

        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut().ok_or(ChatError::Closed)?;
        let mut limited = reader.take(MAX_LINE_BYTES as u64 + 2);
        let mut buf = Vec::new();

        let read = tokio::select! {
            result = limited.read_until(b'\n', &mut buf) => result.map_err(ChatError::ReadFailed)?,
            _ = wait_closed(&mut closed) => return Ok(None),
        };

        if read == 0 {
            return Ok(None);
        }
        decode_line(buf).map(Some)
    }

    /// Close the socket and release both adapters
    ///
    /// Safe to call any number of times; later calls find nothing left to release.
    /// I/O errors during shutdown are ignored.
    pub async fn close(&self) {
        if !self.signal_close() {
            debug!(connection = %self.id, "Closing connection to {}", self.endpoint);
        }

        if let Some(writer) = self.writer.lock().await.take() {
            let mut write_half = writer.into_inner();
            if let Err(e) = write_half.shutdown().await {
                trace!(connection = %self.id, "Ignoring shutdown error: {}", e);
            }
        }

        self.reader.lock().await.take();
    }

    /// Mark the connection closed without releasing the socket
    ///
    /// Wakes pending reads and writes; the socket itself is released by `close()`
    /// or when the last reference is dropped. Returns whether it was already closed.
    pub(crate) fn signal_close(&self) -> bool {
        self.closed.send_replace(true)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Resolves once the connection has been closed
async fn wait_closed(closed: &mut watch::Receiver<bool>) {
    let _ = closed.wait_for(|is_closed| *is_closed).await;
}

/// Strip the line terminator and decode, replacing invalid UTF-8
fn decode_line(mut buf: Vec<u8>) -> ChatResult<String> {
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }

    if buf.len() > MAX_LINE_BYTES {
        return Err(ChatError::ReadFailed(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("line exceeds {} bytes", MAX_LINE_BYTES),
        )));
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
