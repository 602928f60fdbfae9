//! Newline-delimited text over raw TCP.

use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::{Connection, ConnectionId, Transport, TransportError};

/// A TCP [`Transport`] carrying one protocol message per `\n`-terminated line.
pub struct LineTransport {
    listener: TcpListener,
}

impl LineTransport {
    /// Binds a new line transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "line transport listening");
        Ok(Self { listener })
    }
}

impl Transport for LineTransport {
    type Connection = LineConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        let conn = LineConnection::from_stream(stream);
        tracing::debug!(id = %conn.id, %addr, "accepted line connection");
        Ok(conn)
    }

    fn local_addr(&self) -> Result<SocketAddr, Self::Error> {
        self.listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)
    }
}

/// One TCP connection. Reads and writes are locked separately so a
/// pending `recv` never holds up `send`.
pub struct LineConnection {
    id: ConnectionId,
    reader: Mutex<LineReader>,
    writer: Mutex<OwnedWriteHalf>,
}

/// The read half plus the bytes of a line that hasn't ended yet. Keeping
/// them here makes `recv` safe to cancel.
struct LineReader {
    inner: BufReader<OwnedReadHalf>,
    pending: Vec<u8>,
}

impl LineReader {
    /// The next complete line with its `\n` or `\r\n` stripped. A final
    /// unterminated line is returned at EOF.
    async fn next_line(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        let n = self.inner.read_until(b'\n', &mut self.pending).await?;
        if n == 0 && self.pending.is_empty() {
            return Ok(None);
        }
        let mut line = std::mem::take(&mut self.pending);
        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }
}

impl LineConnection {
    /// Wraps an established stream.
    pub fn from_stream(stream: TcpStream) -> Self {
        let (read, write) = stream.into_split();
        Self {
            id: ConnectionId::next(),
            reader: Mutex::new(LineReader {
                inner: BufReader::new(read),
                pending: Vec::new(),
            }),
            writer: Mutex::new(write),
        }
    }

    /// Opens a client-side connection. Used by tools and tests.
    pub async fn connect(addr: SocketAddr) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        Ok(Self::from_stream(stream))
    }
}

impl Connection for LineConnection {
    type Error = TransportError;

    async fn send(&self, line: &str) -> Result<(), Self::Error> {
        if line.contains(['\n', '\r']) {
            return Err(TransportError::EmbeddedNewline);
        }
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        let mut writer = self.writer.lock().await;
        writer
            .write_all(&buf)
            .await
            .map_err(TransportError::SendFailed)
    }

    async fn recv(&self) -> Result<Option<String>, Self::Error> {
        let mut reader = self.reader.lock().await;
        loop {
            let Some(bytes) = reader
                .next_line()
                .await
                .map_err(TransportError::ReceiveFailed)?
            else {
                return Ok(None);
            };
            match String::from_utf8(bytes) {
                Ok(line) => return Ok(Some(line)),
                Err(e) => {
                    tracing::warn!(id = %self.id, error = %e, "dropping line that is not UTF-8");
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
