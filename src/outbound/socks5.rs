//! SOCKS5 client outbound implementation
//!
//! Implements the CONNECT subset of RFC 1928 plus the private `0x81` method
//! spoken between cooperating gateways.
//!
//! # Protocol Overview
//!
//! 1. Client offers methods `0x00` (no auth) and `0x81` (obfuscated)
//! 2. Server replies with the selected method
//! 3. Client sends CONNECT with a domain address (complemented under `0x81`)
//! 4. Server replies with a 10-byte status reply
//! 5. Under `0x81` every later byte is complemented in both directions

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use super::direct::dial;
use super::socks5_common::{
    reply_message, ATYP_DOMAIN, AUTH_METHOD_NONE, AUTH_METHOD_OBFUSCATED, CMD_CONNECT,
    CONNECT_REPLY_LEN, REPLY_SUCCEEDED, SOCKS5_VERSION,
};
use super::traits::{Outbound, OutboundConnection, OutboundStream};
use crate::error::OutboundError;
use crate::io::{complement_in_place, XorStream};

/// Deadline covering dial and SOCKS5 handshake
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Method selection message offered to the upstream
const GREETING: [u8; 4] = [SOCKS5_VERSION, 2, AUTH_METHOD_NONE, AUTH_METHOD_OBFUSCATED];

/// Build a CONNECT request with a domain address
///
/// The domain bytes are complemented when the obfuscated method was negotiated.
fn build_connect_request(host: &str, port: u16, obfuscated: bool) -> Result<Vec<u8>, OutboundError> {
    let domain_len = u8::try_from(host.len())
        .map_err(|_| OutboundError::InvalidDestination(format!("domain too long: {host}")))?;

    let mut request = Vec::with_capacity(7 + host.len());

    // VER | CMD | RSV | ATYP
    request.extend_from_slice(&[SOCKS5_VERSION, CMD_CONNECT, 0x00, ATYP_DOMAIN]);

    // DST.ADDR
    request.push(domain_len);
    let start = request.len();
    request.extend_from_slice(host.as_bytes());
    if obfuscated {
        complement_in_place(&mut request[start..]);
    }

    // DST.PORT (network byte order)
    request.extend_from_slice(&port.to_be_bytes());

    Ok(request)
}

/// Perform method negotiation and CONNECT on an established stream
///
/// Returns `true` when the server selected the obfuscated method, in which
/// case the caller must wrap the stream in [`XorStream`].
///
/// # Errors
///
/// Returns `OutboundError::Socks5` when the server picks an unsupported
/// method or rejects the request.
pub async fn socks5_handshake<S>(
    stream: &mut S,
    host: &str,
    port: u16,
    upstream: &str,
) -> Result<bool, OutboundError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    trace!("Sending SOCKS5 method selection: {:?}", GREETING);
    stream.write_all(&GREETING).await?;

    let mut response = [0u8; 2];
    stream.read_exact(&mut response).await?;
    trace!("SOCKS5 method response: {:?}", response);

    let obfuscated = match response[1] {
        AUTH_METHOD_NONE => false,
        AUTH_METHOD_OBFUSCATED => true,
        other => {
            return Err(OutboundError::socks5(
                upstream,
                format!("unsupported auth method: {other:#04x}"),
            ))
        }
    };

    let request = build_connect_request(host, port, obfuscated)?;
    stream.write_all(&request).await?;

    let mut reply = [0u8; CONNECT_REPLY_LEN];
    stream.read_exact(&mut reply).await?;
    trace!("SOCKS5 reply: {:?}", reply);

    if reply[1] != REPLY_SUCCEEDED {
        warn!(
            "SOCKS5 server {} refused {}:{}: {} ({:#04x})",
            upstream,
            host,
            port,
            reply_message(reply[1]),
            reply[1]
        );
        return Err(OutboundError::socks5(upstream, "CONNECT request failed"));
    }

    Ok(obfuscated)
}

/// SOCKS5 client outbound
#[derive(Debug)]
pub struct Socks5Outbound {
    /// Channel name
    tag: String,
    /// Upstream SOCKS5 server `host:port`
    server_addr: String,
}

impl Socks5Outbound {
    /// Create a SOCKS5 outbound for the server at `server_addr`
    pub fn new(tag: impl Into<String>, server_addr: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            server_addr: server_addr.into(),
        }
    }

    /// Upstream server address
    #[must_use]
    pub fn server_addr(&self) -> &str {
        &self.server_addr
    }
}

#[async_trait]
impl Outbound for Socks5Outbound {
    async fn connect(&self, host: &str, port: u16) -> Result<OutboundConnection, OutboundError> {
        debug!("[{}] SOCKS5 connect to {}:{} via {}", self.tag, host, port, self.server_addr);

        let handshake = async {
            let mut stream = dial(&self.server_addr, HANDSHAKE_TIMEOUT).await?;
            let obfuscated = socks5_handshake(&mut stream, host, port, &self.server_addr).await?;
            Ok::<_, OutboundError>((stream, obfuscated))
        };

        let (stream, obfuscated) = timeout(HANDSHAKE_TIMEOUT, handshake)
            .await
            .map_err(|_| OutboundError::Timeout {
                addr: self.server_addr.clone(),
                timeout_secs: HANDSHAKE_TIMEOUT.as_secs(),
            })??;

        let stream = if obfuscated {
            debug!("[{}] obfuscated session with {}", self.tag, self.server_addr);
            OutboundStream::Obfuscated(XorStream::new(stream))
        } else {
            OutboundStream::Tcp(stream)
        };

        Ok(OutboundConnection::new(stream, self.server_addr.clone()))
    }

    fn tag(&self) -> &str {
        &self.tag
    }

    fn outbound_type(&self) -> &'static str {
        "socks5"
    }
}
