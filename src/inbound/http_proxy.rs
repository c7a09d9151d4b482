//! HTTP forward-proxy inbound handler
//!
//! Handles absolute-URI requests such as `GET http://example.com/path HTTP/1.1`.
//! Only the request line is touched: scheme and authority are removed to form
//! an origin-form line, which is written to the peer; headers and body follow
//! through the relay unchanged.

use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::{parse_authority, read_line, ClientStream, Destination, Session};
use crate::error::{GatewayError, InboundError, OutboundError};
use crate::rules::ChannelRouter;

const SCHEME: &[u8] = b"http://";

/// Port used when the authority has none
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Request line rewritten to origin form, plus its destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenRequest {
    /// Destination taken from the authority
    pub destination: Destination,
    /// Origin-form request line, line ending preserved
    pub line: Vec<u8>,
}

/// Rewrite an absolute-URI request line
///
/// The authority ends at the first `/` after `http://`. A URI with no path
/// (`GET http://example.com HTTP/1.1`) ends at the space and gets path `/`.
///
/// # Errors
///
/// Returns a protocol error when the line has no `http://` URI and
/// `InvalidPort` for a malformed port.
pub fn rewrite_request_line(line: &[u8]) -> Result<RewrittenRequest, InboundError> {
    let scheme_start = line
        .windows(SCHEME.len())
        .position(|w| w == SCHEME)
        .ok_or_else(|| InboundError::protocol("request line has no http:// URI"))?;
    let authority_start = scheme_start + SCHEME.len();

    let authority_len = line[authority_start..]
        .iter()
        .position(|&b| b == b'/' || b == b' ' || b == b'\r' || b == b'\n')
        .ok_or_else(|| InboundError::protocol("unterminated request URI"))?;
    let authority_end = authority_start + authority_len;

    let authority = std::str::from_utf8(&line[authority_start..authority_end])
        .map_err(|_| InboundError::protocol("request authority is not UTF-8"))?;
    let destination = parse_authority(authority, Some(DEFAULT_HTTP_PORT))?;

    let mut rewritten = Vec::with_capacity(line.len() - SCHEME.len() - authority_len + 1);
    rewritten.extend_from_slice(&line[..scheme_start]);
    if line[authority_end] != b'/' {
        rewritten.push(b'/');
    }
    rewritten.extend_from_slice(&line[authority_end..]);

    Ok(RewrittenRequest {
        destination,
        line: rewritten,
    })
}

/// Handle a forward-proxy request
///
/// # Errors
///
/// Returns `GatewayError::Inbound` for malformed requests and
/// `GatewayError::Outbound` when the channel cannot reach the destination
/// or the rewritten line cannot be forwarded.
pub async fn handle<S>(mut client: S, router: &ChannelRouter) -> Result<Session<S>, GatewayError>
where
    S: AsyncBufRead + AsyncWrite + Unpin,
{
    let mut line = Vec::new();
    read_line(&mut client, &mut line).await?;
    let RewrittenRequest {
        destination,
        line: rewritten,
    } = rewrite_request_line(&line)?;

    let channel = router.resolve(&destination.host);
    debug!("HTTP proxy {} via channel '{}'", destination, channel.name());

    let mut peer = channel.connect(&destination.host, destination.port).await?;
    peer.stream_mut()
        .write_all(&rewritten)
        .await
        .map_err(OutboundError::from)?;

    Ok(Session {
        client: ClientStream::Plain(client),
        peer,
        destination,
        channel,
    })
}
