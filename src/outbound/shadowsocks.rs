//! Shadowsocks outbound implementation
//!
//! A Shadowsocks channel owns a pool of servers sharing one method and
//! password. The pool keeps a cursor naming the server the next connection
//! will use; a failed dial moves the cursor forward so that the *next* call
//! tries another server. A single call never retries.
//!
//! # Example
//!
//! ```no_run
//! use proxy_gateway::outbound::{Outbound, ShadowsocksOutbound};
//! use proxy_gateway::shadowsocks::ShadowsocksMethod;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let outbound = ShadowsocksOutbound::new(
//!     "ss-hk",
//!     ShadowsocksMethod::Aes256Gcm,
//!     "secret",
//!     "10.0.0.3:8388,10.0.0.4:8388",
//! )?;
//! let conn = outbound.connect("example.com", 443).await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use shadowsocks::{
    config::{ServerConfig, ServerType},
    context::{Context as SsContext, SharedContext},
    net::TcpStream as SsTcpStream,
    relay::{socks5::Address as SsAddress, tcprelay::ProxyClientStream},
    ServerAddr,
};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::traits::{host_port, Outbound, OutboundConnection, OutboundStream};
use crate::error::OutboundError;
use crate::shadowsocks::{ShadowsocksError, ShadowsocksMethod, ShadowsocksSettings};

/// Dial timeout for a single Shadowsocks server
pub const SS_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Shadowsocks Stream Wrapper
// ============================================================================

/// Wrapper around `ProxyClientStream` giving `OutboundStream` a concrete type
pub struct ShadowsocksStream {
    inner: ProxyClientStream<SsTcpStream>,
}

impl ShadowsocksStream {
    fn new(inner: ProxyClientStream<SsTcpStream>) -> Self {
        Self { inner }
    }
}

impl AsyncRead for ShadowsocksStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for ShadowsocksStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

impl fmt::Debug for ShadowsocksStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShadowsocksStream").finish_non_exhaustive()
    }
}

// ============================================================================
// Server Pool
// ============================================================================

/// Ordered Shadowsocks servers plus the shared failover cursor
///
/// Each entry is a keyed `ServerConfig`; every connection derives its own
/// cipher state from it, so concurrent sessions share nothing mutable beyond
/// the cursor.
pub struct ServerPool {
    servers: Vec<ServerConfig>,
    cursor: RwLock<usize>,
}

impl ServerPool {
    /// Build the pool from parsed `(host, port)` entries
    ///
    /// # Errors
    ///
    /// Returns `ShadowsocksError` if the list is empty or the password is not
    /// usable with `method` (AEAD-2022 methods need a base64 key).
    pub fn new(
        method: ShadowsocksMethod,
        password: &str,
        servers: &[(String, u16)],
    ) -> Result<Self, ShadowsocksError> {
        if servers.is_empty() {
            return Err(ShadowsocksError::InvalidServerAddress(
                "empty server list".into(),
            ));
        }

        let servers = servers
            .iter()
            .map(|(host, port)| {
                let addr = match host.parse::<IpAddr>() {
                    Ok(ip) => ServerAddr::SocketAddr(SocketAddr::new(ip, *port)),
                    Err(_) => ServerAddr::DomainName(host.clone(), *port),
                };
                ServerConfig::new(addr, password.to_string(), method.to_cipher_kind())
                    .map_err(|e| ShadowsocksError::InvalidPassword(format!("{e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            servers,
            cursor: RwLock::new(0),
        })
    }

    /// Number of servers
    #[must_use]
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Always false; construction rejects an empty list
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Index the next connection will use
    #[must_use]
    pub fn cursor(&self) -> usize {
        *self.cursor.read()
    }

    /// Server at `index` as `host:port`
    #[must_use]
    pub fn server_label(&self, index: usize) -> Option<String> {
        self.servers.get(index).map(|s| s.addr().to_string())
    }

    /// Server the next connection will use
    fn current(&self) -> (usize, &ServerConfig) {
        let index = *self.cursor.read();
        (index, &self.servers[index])
    }

    /// Move the cursor one step forward after a failed dial
    fn advance(&self) -> usize {
        let mut cursor = self.cursor.write();
        *cursor = (*cursor + 1) % self.servers.len();
        *cursor
    }
}

impl fmt::Debug for ServerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let servers: Vec<String> = self.servers.iter().map(|s| s.addr().to_string()).collect();
        f.debug_struct("ServerPool")
            .field("servers", &servers)
            .field("cursor", &self.cursor())
            .finish()
    }
}

// ============================================================================
// Shadowsocks Outbound
// ============================================================================

/// Shadowsocks outbound over a failover pool
pub struct ShadowsocksOutbound {
    /// Channel name
    tag: String,
    /// Encryption method
    method: ShadowsocksMethod,
    /// Shadowsocks context (client side)
    ss_context: SharedContext,
    /// Servers and cursor
    pool: ServerPool,
}

impl ShadowsocksOutbound {
    /// Create a Shadowsocks outbound from a comma-separated server list
    ///
    /// # Errors
    ///
    /// Returns `ShadowsocksError` if the server list or password is invalid.
    pub fn new(
        tag: impl Into<String>,
        method: ShadowsocksMethod,
        password: &str,
        servers: &str,
    ) -> Result<Self, ShadowsocksError> {
        let tag = tag.into();
        let servers = ShadowsocksSettings::parse_servers(servers)?;
        let pool = ServerPool::new(method, password, &servers)?;

        debug!(
            "Created Shadowsocks outbound '{}' with {} server(s), method {}",
            tag,
            pool.len(),
            method
        );

        Ok(Self {
            tag,
            method,
            ss_context: SsContext::new_shared(ServerType::Local),
            pool,
        })
    }

    /// Get the server pool
    #[must_use]
    pub const fn pool(&self) -> &ServerPool {
        &self.pool
    }

    /// Get the encryption method
    #[must_use]
    pub const fn method(&self) -> ShadowsocksMethod {
        self.method
    }
}

#[async_trait]
impl Outbound for ShadowsocksOutbound {
    async fn connect(&self, host: &str, port: u16) -> Result<OutboundConnection, OutboundError> {
        let (index, server) = self.pool.current();
        let server_label = server.addr().to_string();
        debug!(
            "[{}] Shadowsocks connecting to {} via server #{} ({})",
            self.tag,
            host_port(host, port),
            index,
            server_label
        );

        let target = SsAddress::DomainNameAddress(host.to_string(), port);
        let result = timeout(
            SS_CONNECT_TIMEOUT,
            ProxyClientStream::connect(self.ss_context.clone(), server, target),
        )
        .await;

        let reason = match result {
            Ok(Ok(stream)) => {
                return Ok(OutboundConnection::new(
                    OutboundStream::Shadowsocks(ShadowsocksStream::new(stream)),
                    server_label,
                ));
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {}s", SS_CONNECT_TIMEOUT.as_secs()),
        };

        let next = self.pool.advance();
        warn!(
            "[{}] Shadowsocks server {} failed: {}; next attempt uses server #{}",
            self.tag, server_label, reason, next
        );
        Err(OutboundError::Shadowsocks {
            server: server_label,
            reason,
        })
    }

    fn tag(&self) -> &str {
        &self.tag
    }

    fn outbound_type(&self) -> &'static str {
        "shadowsocks"
    }
}

impl fmt::Debug for ShadowsocksOutbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShadowsocksOutbound")
            .field("tag", &self.tag)
            .field("method", &self.method)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}
