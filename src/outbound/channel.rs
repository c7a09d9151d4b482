//! Channels: a channel definition bound to its connector
//!
//! Channels are built once when the routing table is loaded and shared by
//! every session routed through them.

use std::fmt;

use tracing::{debug, info};

use super::direct::DirectOutbound;
use super::http::HttpConnectOutbound;
use super::shadowsocks::ShadowsocksOutbound;
use super::socks5::Socks5Outbound;
use super::traits::{Outbound, OutboundConnection};
use crate::config::{ChannelDefinition, ChannelKind};
use crate::error::{ConfigError, OutboundError};

/// A named outbound path
pub struct Channel {
    /// Definition the channel was built from
    definition: ChannelDefinition,
    /// Connector selected by the definition's type
    connector: Box<dyn Outbound>,
}

impl Channel {
    /// Build a channel and its connector from a definition
    ///
    /// A Shadowsocks channel builds its server pool here, once.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the type string or Shadowsocks settings are invalid.
    pub fn from_definition(definition: ChannelDefinition) -> Result<Self, ConfigError> {
        let name = definition.name.clone();
        let connector: Box<dyn Outbound> = match definition.kind()? {
            ChannelKind::Direct => Box::new(DirectOutbound::new(name)),
            ChannelKind::Http => Box::new(HttpConnectOutbound::new(name, definition.addr.trim())),
            ChannelKind::Socks5 => Box::new(Socks5Outbound::new(name, definition.addr.trim())),
            ChannelKind::Shadowsocks { method, password } => Box::new(ShadowsocksOutbound::new(
                name,
                method,
                &password,
                &definition.addr,
            )?),
        };

        info!(
            "Channel '{}' ready (type: {})",
            definition.name,
            connector.outbound_type()
        );

        Ok(Self::with_connector(definition, connector))
    }

    /// Pair a definition with an explicit connector
    pub fn with_connector(definition: ChannelDefinition, connector: Box<dyn Outbound>) -> Self {
        Self {
            definition,
            connector,
        }
    }

    /// Channel name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Definition the channel was built from
    #[must_use]
    pub const fn definition(&self) -> &ChannelDefinition {
        &self.definition
    }

    /// Connector type name
    #[must_use]
    pub fn outbound_type(&self) -> &'static str {
        self.connector.outbound_type()
    }

    /// Connect to `host:port` through this channel
    ///
    /// # Errors
    ///
    /// Returns the connector's `OutboundError`.
    pub async fn connect(&self, host: &str, port: u16) -> Result<OutboundConnection, OutboundError> {
        let conn = self.connector.connect(host, port).await?;
        debug!(
            "Channel '{}' connected {}:{} (upstream {}, direct: {})",
            self.name(),
            host,
            port,
            conn.upstream(),
            conn.is_direct()
        );
        Ok(conn)
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.definition.name)
            .field("type", &self.connector.outbound_type())
            .field("addr", &self.definition.addr)
            .finish()
    }
}
