//! Request dispatch: one request in, one fixed response out.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::protocol::codec::{read_message, write_message, ProtocolError};
use crate::protocol::{MessageLimits, Response};

/// Failure while dispatching a request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request message never arrived intact; nothing was written.
    #[error("request read failed: {0}")]
    Request(#[source] ProtocolError),

    /// The response was chosen but could not be delivered.
    #[error("failed to write {response} response: {source}")]
    Write {
        response: Response,
        #[source]
        source: ProtocolError,
    },
}

/// Consume one request and answer according to the access decision.
///
/// The request body is not inspected. Exactly one write is attempted.
pub async fn dispatch<S>(
    session: &mut S,
    allowed: bool,
    limits: MessageLimits,
) -> Result<Response, DispatchError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = read_message(session, limits)
        .await
        .map_err(DispatchError::Request)?;
    tracing::trace!(request_len = request.len(), "Request received");

    let response = Response::for_decision(allowed);
    write_message(session, response.as_bytes(), limits)
        .await
        .map_err(|source| DispatchError::Write { response, source })?;

    Ok(response)
}
