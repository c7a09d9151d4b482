//! HTTP CONNECT outbound implementation
//!
//! Tunnels through an upstream HTTP proxy. The response header is read one
//! byte at a time after a short initial chunk so that no tunneled payload is
//! consumed along with it.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::direct::dial;
use super::traits::{host_port, Outbound, OutboundConnection, OutboundStream};
use crate::error::OutboundError;

/// Deadline covering dial and CONNECT exchange
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum accepted size of the upstream response header
pub const MAX_RESPONSE_LEN: usize = 256;

/// Bytes read before switching to byte-at-a-time reads ("HTTP/1.1 200")
const INITIAL_CHUNK_LEN: usize = 12;

/// Offset of the first status digit in `HTTP/1.1 NNN`
const STATUS_DIGIT_OFFSET: usize = 9;

/// Build the CONNECT request for `target`
fn connect_request(target: &str) -> String {
    format!("CONNECT {target} HTTP/1.1\r\nHost: {target}\r\n\r\n")
}

/// Perform the CONNECT exchange on an established stream
///
/// # Errors
///
/// Returns `ResponseTooLong` if the header exceeds [`MAX_RESPONSE_LEN`] and
/// `HttpConnectRejected` for any non-2xx status.
pub async fn http_connect_handshake<S>(
    stream: &mut S,
    target: &str,
    upstream: &str,
) -> Result<(), OutboundError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(connect_request(target).as_bytes()).await?;
    stream.flush().await?;

    let mut response = Vec::with_capacity(MAX_RESPONSE_LEN);
    let mut chunk = [0u8; INITIAL_CHUNK_LEN];
    stream.read_exact(&mut chunk).await?;
    response.extend_from_slice(&chunk);

    let mut byte = [0u8; 1];
    while !response.ends_with(b"\r\n\r\n") {
        if response.len() >= MAX_RESPONSE_LEN {
            return Err(OutboundError::ResponseTooLong {
                addr: upstream.to_string(),
                limit: MAX_RESPONSE_LEN,
            });
        }
        stream.read_exact(&mut byte).await?;
        response.push(byte[0]);
    }

    if response[STATUS_DIGIT_OFFSET] != b'2' {
        let status_line = response
            .split(|&b| b == b'\r')
            .next()
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .unwrap_or_default();
        return Err(OutboundError::HttpConnectRejected {
            addr: upstream.to_string(),
            status_line,
        });
    }

    Ok(())
}

/// HTTP CONNECT outbound
#[derive(Debug)]
pub struct HttpConnectOutbound {
    /// Channel name
    tag: String,
    /// Upstream proxy `host:port`
    proxy_addr: String,
}

impl HttpConnectOutbound {
    /// Create an HTTP CONNECT outbound for the proxy at `proxy_addr`
    pub fn new(tag: impl Into<String>, proxy_addr: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            proxy_addr: proxy_addr.into(),
        }
    }

    /// Upstream proxy address
    #[must_use]
    pub fn proxy_addr(&self) -> &str {
        &self.proxy_addr
    }
}

#[async_trait]
impl Outbound for HttpConnectOutbound {
    async fn connect(&self, host: &str, port: u16) -> Result<OutboundConnection, OutboundError> {
        let target = host_port(host, port);
        debug!("[{}] CONNECT {} via {}", self.tag, target, self.proxy_addr);

        let handshake = async {
            let mut stream = dial(&self.proxy_addr, HANDSHAKE_TIMEOUT).await?;
            http_connect_handshake(&mut stream, &target, &self.proxy_addr).await?;
            Ok::<_, OutboundError>(stream)
        };

        // The deadline ends with the handshake; relay I/O is not bounded by it.
        let stream = timeout(HANDSHAKE_TIMEOUT, handshake)
            .await
            .map_err(|_| OutboundError::Timeout {
                addr: self.proxy_addr.clone(),
                timeout_secs: HANDSHAKE_TIMEOUT.as_secs(),
            })?
            .map_err(|e| {
                warn!("[{}] HTTP proxy {} failed: {}", self.tag, self.proxy_addr, e);
                e
            })?;

        Ok(OutboundConnection::new(
            OutboundStream::Tcp(stream),
            self.proxy_addr.clone(),
        ))
    }

    fn tag(&self) -> &str {
        &self.tag
    }

    fn outbound_type(&self) -> &'static str {
        "http"
    }
}
