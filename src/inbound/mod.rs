//! Inbound protocol handlers
//!
//! Each accepted connection is classified by its first three bytes:
//!
//! | First bytes          | Handler                    |
//! |----------------------|----------------------------|
//! | `CON`                | [`http_connect`]           |
//! | uppercase ASCII      | [`http_proxy`]             |
//! | `0x05`               | [`socks5`]                 |
//! | anything else        | dropped, no response       |
//!
//! A handler parses the request, resolves the channel, dials the destination
//! and returns a [`Session`] ready for the relay.

pub mod http_connect;
pub mod http_proxy;
pub mod socks5;

use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, ReadBuf};

use crate::error::InboundError;
use crate::io::XorStream;
use crate::outbound::socks5_common::SOCKS5_VERSION;
use crate::outbound::{host_port, Channel, OutboundConnection};

/// Longest request or header line accepted from a client
pub const MAX_LINE_LEN: usize = 4096;

/// Number of bytes inspected to pick a handler
pub const DETECT_LEN: usize = 3;

/// Client-facing protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundProtocol {
    /// `CONNECT host:port HTTP/1.1`
    HttpConnect,
    /// Absolute-URI request to an HTTP forward proxy
    HttpProxy,
    /// SOCKS5 (RFC 1928) with the private `0x81` method
    Socks5,
}

impl InboundProtocol {
    /// Classify a connection by its first bytes
    ///
    /// # Errors
    ///
    /// Returns `InboundError::UnknownProtocol` for anything unrecognized.
    pub fn detect(head: &[u8; DETECT_LEN]) -> Result<Self, InboundError> {
        if head == b"CON" {
            Ok(Self::HttpConnect)
        } else if head[0].is_ascii_uppercase() {
            Ok(Self::HttpProxy)
        } else if head[0] == SOCKS5_VERSION {
            Ok(Self::Socks5)
        } else {
            Err(InboundError::UnknownProtocol(head[0]))
        }
    }
}

impl fmt::Display for InboundProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HttpConnect => write!(f, "http-connect"),
            Self::HttpProxy => write!(f, "http-proxy"),
            Self::Socks5 => write!(f, "socks5"),
        }
    }
}

/// Destination requested by a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Domain name or textual IP
    pub host: String,
    /// Port (1-65535)
    pub port: u16,
}

impl Destination {
    /// Create a destination
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&host_port(&self.host, self.port))
    }
}

/// Client side of a session, plain or obfuscated
///
/// Chosen once by the handler before the relay starts.
#[derive(Debug)]
pub enum ClientStream<S> {
    /// Bytes pass through unchanged
    Plain(S),
    /// SOCKS5 client that negotiated method `0x81`
    Obfuscated(XorStream<S>),
}

impl<S> ClientStream<S> {
    /// Whether the client side is obfuscated
    #[must_use]
    pub const fn is_obfuscated(&self) -> bool {
        matches!(self, Self::Obfuscated(_))
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for ClientStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Self::Obfuscated(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for ClientStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Self::Obfuscated(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_flush(cx),
            Self::Obfuscated(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Self::Obfuscated(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// A handled request: both ends connected, ready to relay
#[derive(Debug)]
pub struct Session<S> {
    /// Client side
    pub client: ClientStream<S>,
    /// Upstream side
    pub peer: OutboundConnection,
    /// Requested destination
    pub destination: Destination,
    /// Channel the destination was routed through
    pub channel: Arc<Channel>,
}

/// Read one line, including its `\n`, refusing lines over [`MAX_LINE_LEN`]
pub(crate) async fn read_line<R>(reader: &mut R, line: &mut Vec<u8>) -> Result<(), InboundError>
where
    R: AsyncBufRead + Unpin,
{
    line.clear();
    let n = reader
        .take(MAX_LINE_LEN as u64)
        .read_until(b'\n', line)
        .await?;

    if n == 0 {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }
    if line.last() != Some(&b'\n') {
        return Err(if n >= MAX_LINE_LEN {
            InboundError::protocol("request line too long")
        } else {
            io::Error::from(io::ErrorKind::UnexpectedEof).into()
        });
    }
    Ok(())
}

/// Parse a decimal port in 1..=65535
pub(crate) fn parse_port(s: &str) -> Result<u16, InboundError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(InboundError::InvalidPort(s.to_string()));
    }
    match s.parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(InboundError::InvalidPort(s.to_string())),
    }
}

/// Split `host[:port]` (IPv6 hosts in brackets) into a destination
///
/// `default_port` applies when the authority carries no port; `None` makes
/// the port mandatory.
pub(crate) fn parse_authority(
    authority: &str,
    default_port: Option<u16>,
) -> Result<Destination, InboundError> {
    let (host, port) = if let Some(rest) = authority.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| InboundError::protocol(format!("bad authority: {authority}")))?;
        let port = if after.is_empty() {
            None
        } else {
            Some(
                after
                    .strip_prefix(':')
                    .ok_or_else(|| InboundError::protocol(format!("bad authority: {authority}")))?,
            )
        };
        (host, port)
    } else {
        match authority.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        }
    };

    if host.is_empty() {
        return Err(InboundError::protocol(format!("empty host in: {authority}")));
    }

    let port = match port {
        Some(port) => parse_port(port)?,
        None => default_port.ok_or_else(|| InboundError::InvalidPort(String::new()))?,
    };

    Ok(Destination::new(host, port))
}
