//! HTTP CONNECT inbound handler
//!
//! Accepts `CONNECT host:port HTTP/1.x`, skips the request headers, dials the
//! destination through the routed channel and answers `200 Connection
//! established`. A failed dial closes the connection without a response.

use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::{parse_authority, read_line, ClientStream, Destination, Session};
use crate::error::{GatewayError, InboundError};
use crate::rules::ChannelRouter;

/// Response sent once the tunnel is up
pub const CONNECT_ESTABLISHED: &[u8] = b"HTTP/1.1 200 Connection established\r\n\r\n";

const METHOD_PREFIX: &[u8] = b"CONNECT ";

/// Parse a CONNECT request line into its destination
///
/// # Errors
///
/// Returns a protocol error for anything but `CONNECT host:port <version>`
/// and `InvalidPort` for a missing or out-of-range port.
pub fn parse_request_line(line: &[u8]) -> Result<Destination, InboundError> {
    let rest = line
        .strip_prefix(METHOD_PREFIX)
        .ok_or_else(|| InboundError::protocol("expected CONNECT request"))?;

    let end = rest
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| InboundError::protocol("missing HTTP version in CONNECT line"))?;

    let authority = std::str::from_utf8(&rest[..end])
        .map_err(|_| InboundError::protocol("CONNECT target is not UTF-8"))?;

    parse_authority(authority, None)
}

/// Consume header lines up to and including the blank line
async fn skip_headers<R>(reader: &mut R) -> Result<(), InboundError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    loop {
        read_line(reader, &mut line).await?;
        if line == b"\r\n" || line == b"\n" {
            return Ok(());
        }
    }
}

/// Handle an HTTP CONNECT request
///
/// # Errors
///
/// Returns `GatewayError::Inbound` for malformed requests and
/// `GatewayError::Outbound` when the channel cannot reach the destination.
pub async fn handle<S>(mut client: S, router: &ChannelRouter) -> Result<Session<S>, GatewayError>
where
    S: AsyncBufRead + AsyncWrite + Unpin,
{
    let mut line = Vec::new();
    read_line(&mut client, &mut line).await?;
    let destination = parse_request_line(&line)?;
    skip_headers(&mut client).await?;

    let channel = router.resolve(&destination.host);
    debug!("CONNECT {} via channel '{}'", destination, channel.name());

    let peer = channel.connect(&destination.host, destination.port).await?;

    client
        .write_all(CONNECT_ESTABLISHED)
        .await
        .map_err(InboundError::from)?;
    client.flush().await.map_err(InboundError::from)?;

    Ok(Session {
        client: ClientStream::Plain(client),
        peer,
        destination,
        channel,
    })
}
