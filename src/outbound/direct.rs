//! Direct outbound implementation
//!
//! This module provides the `DirectOutbound` type which dials the
//! destination itself with no intermediate proxy.

use std::time::Duration;

use async_trait::async_trait;
use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::traits::{host_port, Outbound, OutboundConnection};
use crate::error::OutboundError;

/// Connect timeout for direct dials
pub const DIRECT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Apply TCP keepalive and `TCP_NODELAY` to a dialed stream
///
/// Failures are logged; the connection stays usable without them.
pub(crate) fn tune_stream(stream: &TcpStream) {
    // - time: 60s idle before first probe
    // - interval: 15s between probes
    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(60))
        .with_interval(Duration::from_secs(15));

    if let Err(e) = SockRef::from(stream).set_tcp_keepalive(&keepalive) {
        warn!("Failed to set TCP keepalive: {}", e);
    }
    if let Err(e) = stream.set_nodelay(true) {
        warn!("Failed to set TCP_NODELAY: {}", e);
    }
}

/// Dial `addr` within `limit`, mapping failures to `OutboundError`
pub(crate) async fn dial(addr: &str, limit: Duration) -> Result<TcpStream, OutboundError> {
    let stream = timeout(limit, TcpStream::connect(addr))
        .await
        .map_err(|_| OutboundError::Timeout {
            addr: addr.to_string(),
            timeout_secs: limit.as_secs(),
        })?
        .map_err(|e| OutboundError::connection_failed(addr, e.to_string()))?;

    tune_stream(&stream);
    Ok(stream)
}

/// Direct outbound - connects directly to the destination
#[derive(Debug)]
pub struct DirectOutbound {
    /// Channel name
    tag: String,
}

impl DirectOutbound {
    /// Create a direct outbound
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

#[async_trait]
impl Outbound for DirectOutbound {
    async fn connect(&self, host: &str, port: u16) -> Result<OutboundConnection, OutboundError> {
        let target = host_port(host, port);
        debug!("[{}] direct connect to {}", self.tag, target);

        let stream = dial(&target, DIRECT_CONNECT_TIMEOUT).await?;
        Ok(OutboundConnection::direct(stream, target))
    }

    fn tag(&self) -> &str {
        &self.tag
    }

    fn outbound_type(&self) -> &'static str {
        "direct"
    }
}
