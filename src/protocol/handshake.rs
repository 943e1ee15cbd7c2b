//! Application-level handshake check.

use tokio::io::AsyncRead;

use crate::protocol::codec::{read_message, ProtocolError};
use crate::protocol::{MessageLimits, HANDSHAKE_TOKEN};

/// Read the first message and compare it with [`HANDSHAKE_TOKEN`].
///
/// Returns `Ok(true)` only on an exact byte match. A single read is made; a
/// token split across TLS records that arrive separately fails verification,
/// as does a token coalesced with the following request. Nothing is written.
pub async fn verify<S>(session: &mut S, limits: MessageLimits) -> Result<bool, ProtocolError>
where
    S: AsyncRead + Unpin,
{
    let message = read_message(session, limits).await?;
    Ok(message == HANDSHAKE_TOKEN)
}
