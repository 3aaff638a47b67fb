//! A connected byte stream with a line reader and a flushing writer

use std::fmt;

use bytes::Bytes;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter,
    ReadHalf, WriteHalf,
};
use tracing::{debug, trace};

use crate::error::{Result, TransportError};

/// Any duplex byte stream a [`Connection`] can run over
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

type BoxedStream = Box<dyn AsyncStream>;

/// Longest header line accepted by [`Connection::read_line`], terminator included
pub const MAX_LINE_LENGTH: usize = 8 * 1024;

/// An open stream to the far end, split into a read side and a write side.
///
/// Reads hand back one newline-terminated chunk at a time with its
/// terminator bytes intact, so callers can count exactly what the peer sent.
pub struct Connection {
    peer: String,
    reader: BufReader<ReadHalf<BoxedStream>>,
    writer: BufWriter<WriteHalf<BoxedStream>>,
}

impl Connection {
    /// Wrap an established stream; `peer` is only used for logs and errors
    pub fn new<S>(stream: S, peer: impl Into<String>) -> Self
    where
        S: AsyncStream + 'static,
    {
        let boxed: BoxedStream = Box::new(stream);
        let (read_half, write_half) = tokio::io::split(boxed);
        Self {
            peer: peer.into(),
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Write all of `data` and flush it to the peer
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        let written = async {
            self.writer.write_all(data).await?;
            self.writer.flush().await
        }
        .await;

        written.map_err(|source| TransportError::WriteFailed {
            peer: self.peer.clone(),
            source,
        })?;
        trace!(peer = %self.peer, bytes = data.len(), "sent");
        Ok(())
    }

    /// Read up to and including the next `\n`.
    ///
    /// Returns `None` once the peer has closed the stream. The final chunk
    /// may lack a terminator if the peer closed mid-line.
    /// Fails with [`TransportError::LineTooLong`] once [`MAX_LINE_LENGTH`]
    /// bytes arrive without a newline.
    pub async fn read_line(&mut self) -> Result<Option<Bytes>> {
        let mut buf = Vec::new();
        let mut limited = (&mut self.reader).take(MAX_LINE_LENGTH as u64);
        let read = limited.read_until(b'\n', &mut buf).await;

        if buf.len() >= MAX_LINE_LENGTH && buf.last() != Some(&b'\n') {
            return Err(TransportError::LineTooLong {
                peer: self.peer.clone(),
                limit: MAX_LINE_LENGTH,
            });
        }
        self.finish_read(read, buf)
    }

    /// Like [`read_line`](Self::read_line) but never consumes more than `limit` bytes.
    ///
    /// Used for message bodies, whose last line need not end in a newline.
    pub async fn read_line_bounded(&mut self, limit: usize) -> Result<Option<Bytes>> {
        let mut buf = Vec::new();
        let mut limited = (&mut self.reader).take(limit as u64);
        let read = limited.read_until(b'\n', &mut buf).await;
        self.finish_read(read, buf)
    }

    fn finish_read(&self, read: std::io::Result<usize>, buf: Vec<u8>) -> Result<Option<Bytes>> {
        let n = read.map_err(|source| TransportError::ReadFailed {
            peer: self.peer.clone(),
            source,
        })?;
        if n == 0 {
            debug!(peer = %self.peer, "peer closed the stream");
            return Ok(None);
        }
        trace!(peer = %self.peer, bytes = n, "received");
        Ok(Some(Bytes::from(buf)))
    }

    /// Release the write side, then the read side, then the socket.
    ///
    /// Both halves are dropped even when the shutdown fails.
    pub async fn close(self) -> Result<()> {
        let Connection {
            peer,
            reader,
            mut writer,
        } = self;

        let shutdown = writer.shutdown().await;
        drop(writer);
        // The read half holds the last reference, dropping it closes the socket
        drop(reader);
        debug!(peer = %peer, "connection closed");

        shutdown.map_err(|source| TransportError::CloseFailed { peer, source })
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connection({})", self.peer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_lines_keep_their_terminators() {
        let (client, mut server) = duplex(1024);
        let mut connection = Connection::new(client, "test-peer");

        server.write_all(b"SIP/2.0 100 Trying\r\nVia: x\nlast").await.unwrap();
        server.shutdown().await.unwrap();

        assert_eq!(connection.read_line().await.unwrap().unwrap(), &b"SIP/2.0 100 Trying\r\n"[..]);
        assert_eq!(connection.read_line().await.unwrap().unwrap(), &b"Via: x\n"[..]);
        assert_eq!(connection.read_line().await.unwrap().unwrap(), &b"last"[..]);
        assert!(connection.read_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bounded_read_stops_at_limit() {
        let (client, mut server) = duplex(1024);
        let mut connection = Connection::new(client, "test-peer");

        server.write_all(b"v=0\r\nabcdefSIP/2.0 200 OK\r\n").await.unwrap();

        assert_eq!(connection.read_line_bounded(11).await.unwrap().unwrap(), &b"v=0\r\n"[..]);
        assert_eq!(connection.read_line_bounded(6).await.unwrap().unwrap(), &b"abcdef"[..]);
        assert_eq!(connection.read_line().await.unwrap().unwrap(), &b"SIP/2.0 200 OK\r\n"[..]);
    }

    #[tokio::test]
    async fn test_overlong_line_is_rejected() {
        let (client, mut server) = duplex(4 * MAX_LINE_LENGTH);
        let mut connection = Connection::new(client, "test-peer");

        let mut exact = vec![b'a'; MAX_LINE_LENGTH - 2];
        exact.extend_from_slice(b"\r\n");
        server.write_all(&exact).await.unwrap();
        server.write_all(&vec![b'x'; MAX_LINE_LENGTH + 1]).await.unwrap();

        let line = connection.read_line().await.unwrap().unwrap();
        assert_eq!(line.len(), MAX_LINE_LENGTH);

        let err = connection.read_line().await.unwrap_err();
        assert!(
            matches!(err, TransportError::LineTooLong { limit: MAX_LINE_LENGTH, .. }),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn test_send_and_close_reach_the_peer() {
        let (client, mut server) = duplex(1024);
        let mut connection = Connection::new(client, "test-peer");

        connection.send(b"OPTIONS sip:x SIP/2.0\r\n\r\n").await.unwrap();
        connection.close().await.unwrap();

        let mut received = Vec::new();
        server.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"OPTIONS sip:x SIP/2.0\r\n\r\n");
    }
}
