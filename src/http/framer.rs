//! Request framing.
//!
//! Delimits one request head (request line plus headers) from a raw byte
//! stream. The head ends at the first `\r\n\r\n`; anything after it is a body
//! this server never looks at.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tracing::trace;

const TERMINATOR: &[u8] = b"\r\n\r\n";

/// Errors that end a connection before a request head was delimited.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the connection without sending anything
    #[error("client sent no data")]
    Empty,

    /// The peer closed the connection in the middle of the head
    #[error("connection closed before the request head was complete")]
    Incomplete,

    #[error("request head exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("timed out waiting for the request head")]
    TimedOut,
}

/// A delimited request head.
#[derive(Debug, Clone)]
pub struct RawRequest {
    head: Bytes,
    trailing: usize,
}

impl RawRequest {
    /// The head bytes, terminator included.
    pub fn head(&self) -> &[u8] {
        &self.head
    }

    /// Number of bytes received after the terminator and discarded.
    pub fn trailing(&self) -> usize {
        self.trailing
    }
}

/// Reads from `reader` until the head terminator is seen or `limit` bytes have
/// been buffered.
pub async fn read_request<R>(reader: &mut R, limit: usize) -> Result<RawRequest, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = BytesMut::with_capacity(limit);
    let mut scanned: usize = 0;

    loop {
        if buffer.len() >= limit {
            return Err(FrameError::TooLarge { limit });
        }

        let room = (limit - buffer.len()) as u64;
        let n = (&mut *reader).take(room).read_buf(&mut buffer).await?;

        if n == 0 {
            return Err(if buffer.is_empty() {
                FrameError::Empty
            } else {
                FrameError::Incomplete
            });
        }

        // The terminator may straddle two reads.
        let from = scanned.saturating_sub(TERMINATOR.len() - 1);
        if let Some(pos) = find_terminator(&buffer[from..]) {
            let head = buffer.split_to(from + pos + TERMINATOR.len()).freeze();
            trace!(head = head.len(), trailing = buffer.len(), "request head framed");
            return Ok(RawRequest {
                head,
                trailing: buffer.len(),
            });
        }
        scanned = buffer.len();
    }
}

/// Discards whatever the peer already sent beyond the head, up to `limit`
/// bytes, without blocking. Closing a socket with unread data makes the kernel
/// answer with a reset, which can destroy the response in flight.
pub fn drain_pending(stream: &TcpStream, limit: usize) -> usize {
    let mut scratch = vec![0u8; limit];
    let mut drained = 0;

    while drained < limit {
        match stream.try_read(&mut scratch[..limit - drained]) {
            Ok(0) => break,
            Ok(n) => drained += n,
            Err(_) => break,
        }
    }

    drained
}

fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(TERMINATOR.len()).position(|w| w == TERMINATOR)
}
