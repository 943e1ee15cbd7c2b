//! Bounded message reads and writes over a session.

use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::MessageLimits;
use crate::resilience::timeouts::{self, TimedOut};

/// Errors from reading or writing a single protocol message.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Peer closed the session before sending a message.
    #[error("peer closed the session")]
    Closed,

    /// Message did not fit in the configured capacity.
    #[error("message exceeds {capacity} bytes")]
    Oversized { capacity: usize },

    #[error(transparent)]
    TimedOut(#[from] TimedOut),

    #[error("session I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Read exactly one message: a single `read` of at most `limits.capacity` bytes.
///
/// Reads into a buffer one byte larger than the capacity so that an oversize
/// message is detected and rejected rather than truncated.
pub async fn read_message<S>(session: &mut S, limits: MessageLimits) -> Result<Vec<u8>, ProtocolError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; limits.capacity + 1];
    let n = timeouts::within(limits.io_timeout, session.read(&mut buf)).await??;

    if n == 0 {
        return Err(ProtocolError::Closed);
    }
    if n > limits.capacity {
        return Err(ProtocolError::Oversized {
            capacity: limits.capacity,
        });
    }

    buf.truncate(n);
    Ok(buf)
}

/// Write one message and flush it to the peer.
pub async fn write_message<S>(
    session: &mut S,
    message: &[u8],
    limits: MessageLimits,
) -> Result<(), ProtocolError>
where
    S: AsyncWrite + Unpin,
{
    timeouts::within(limits.io_timeout, async {
        session.write_all(message).await?;
        session.flush().await
    })
    .await??;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn limits(capacity: usize) -> MessageLimits {
        MessageLimits::new(capacity, None)
    }

    #[tokio::test]
    async fn reads_single_message_with_exact_length() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(b"hello").await.unwrap();

        let msg = read_message(&mut server, limits(16)).await.unwrap();
        assert_eq!(msg, b"hello");
    }

    #[tokio::test]
    async fn message_at_capacity_is_accepted() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[7u8; 16]).await.unwrap();

        let msg = read_message(&mut server, limits(16)).await.unwrap();
        assert_eq!(msg.len(), 16);
    }

    #[tokio::test]
    async fn oversize_message_is_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[7u8; 17]).await.unwrap();

        let err = read_message(&mut server, limits(16)).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Oversized { capacity: 16 }));
    }

    #[tokio::test]
    async fn closed_session_is_reported() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);

        let err = read_message(&mut server, limits(16)).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Closed));
    }

    #[tokio::test]
    async fn silent_peer_times_out() {
        let (_client, mut server) = tokio::io::duplex(64);
        let limits = MessageLimits::new(16, Some(Duration::from_millis(20)));

        let err = read_message(&mut server, limits).await.unwrap_err();
        assert!(matches!(err, ProtocolError::TimedOut(_)));
    }

    #[tokio::test]
    async fn write_reaches_peer() {
        let (mut client, mut server) = tokio::io::duplex(64);
        write_message(&mut server, b"OK", limits(16)).await.unwrap();
        drop(server);

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"OK");
    }
}
