//! Outbound trait definitions
//!
//! This module defines the `Outbound` trait implemented by every connector
//! and the stream types a connector hands back to the relay.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

use super::shadowsocks::ShadowsocksStream;
use crate::error::OutboundError;
use crate::io::XorStream;

/// Stream to the upstream side of a session
///
/// The variant is fixed by the connector before the relay starts; the relay
/// itself never transforms bytes.
pub enum OutboundStream {
    /// Plain TCP (direct, HTTP CONNECT, SOCKS5 without obfuscation)
    Tcp(TcpStream),
    /// SOCKS5 upstream that negotiated method `0x81`
    Obfuscated(XorStream<TcpStream>),
    /// Shadowsocks encrypted stream
    Shadowsocks(ShadowsocksStream),
}

impl OutboundStream {
    /// Transport label used in logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Tcp(_) => "tcp",
            Self::Obfuscated(_) => "obfuscated",
            Self::Shadowsocks(_) => "shadowsocks",
        }
    }
}

impl fmt::Debug for OutboundStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OutboundStream").field(&self.kind()).finish()
    }
}

impl AsyncRead for OutboundStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            Self::Obfuscated(s) => Pin::new(s).poll_read(cx, buf),
            Self::Shadowsocks(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for OutboundStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            Self::Obfuscated(s) => Pin::new(s).poll_write(cx, buf),
            Self::Shadowsocks(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(s) => Pin::new(s).poll_flush(cx),
            Self::Obfuscated(s) => Pin::new(s).poll_flush(cx),
            Self::Shadowsocks(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            Self::Obfuscated(s) => Pin::new(s).poll_shutdown(cx),
            Self::Shadowsocks(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// Represents an established outbound connection
#[derive(Debug)]
pub struct OutboundConnection {
    /// Stream to the upstream (proxy or destination)
    stream: OutboundStream,
    /// Address actually dialed
    upstream: String,
    /// True only for the direct connector
    direct: bool,
}

impl OutboundConnection {
    /// Create a connection through an upstream proxy
    pub fn new(stream: OutboundStream, upstream: impl Into<String>) -> Self {
        Self {
            stream,
            upstream: upstream.into(),
            direct: false,
        }
    }

    /// Create a connection dialed straight to the destination
    pub fn direct(stream: TcpStream, upstream: impl Into<String>) -> Self {
        Self {
            stream: OutboundStream::Tcp(stream),
            upstream: upstream.into(),
            direct: true,
        }
    }

    /// Whether the destination was dialed directly
    ///
    /// Informational only; the relay treats every connection alike.
    #[must_use]
    pub const fn is_direct(&self) -> bool {
        self.direct
    }

    /// Address actually dialed
    #[must_use]
    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// Get the underlying stream
    #[must_use]
    pub const fn stream(&self) -> &OutboundStream {
        &self.stream
    }

    /// Get mutable reference to the stream
    pub fn stream_mut(&mut self) -> &mut OutboundStream {
        &mut self.stream
    }

    /// Consume and return the underlying stream
    #[must_use]
    pub fn into_stream(self) -> OutboundStream {
        self.stream
    }
}

/// Core trait for outbound connectors
///
/// All connector types (direct, HTTP CONNECT, SOCKS5, Shadowsocks) implement
/// this trait. A connector is bound to one channel and shared by every
/// session routed through it.
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Open a stream to `host:port` through this connector.
    ///
    /// # Errors
    ///
    /// Returns `OutboundError` if dialing or the upstream handshake fails.
    async fn connect(&self, host: &str, port: u16) -> Result<OutboundConnection, OutboundError>;

    /// Get the tag (channel name) this connector was built for
    fn tag(&self) -> &str;

    /// Get the outbound type name
    fn outbound_type(&self) -> &'static str;
}

/// Format a destination for logs and wire requests, bracketing IPv6 literals
#[must_use]
pub fn host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}
