//! Configuration types for proxy-gateway
//!
//! This module defines the configuration structures consumed by the gateway.
//! Configuration is loaded from JSON files and validated at startup, so a
//! malformed channel type is reported before any connection is accepted.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::shadowsocks::{ShadowsocksMethod, ShadowsocksSettings};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Listen configuration
    #[serde(default)]
    pub listen: ListenConfig,

    /// Domain routing rules, first match wins
    #[serde(default)]
    pub channels: Vec<RuleConfig>,

    /// Channel used for SOCKS5 clients that negotiated no authentication
    pub socks5: ChannelDefinition,

    /// Channel used when no rule matches
    pub default: ChannelDefinition,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a rule or channel definition is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for rule in &self.channels {
            rule.validate()?;
        }
        self.socks5.validate()?;
        self.default.validate()?;
        self.log.validate()?;
        Ok(())
    }

    /// Create a minimal default configuration
    #[must_use]
    pub fn default_config() -> Self {
        Self {
            listen: ListenConfig::default(),
            channels: Vec::new(),
            socks5: ChannelDefinition::direct("socks5"),
            default: ChannelDefinition::direct("direct"),
            log: LogConfig::default(),
        }
    }
}

/// Listen configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenConfig {
    /// Listen address (e.g., "127.0.0.1:18080")
    #[serde(default = "default_listen_address")]
    pub address: SocketAddr,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: default_listen_address(),
        }
    }
}

/// An outbound path definition
///
/// The `type` string selects the connector: `"http"`, `"socks5"`,
/// `"ss,<method>,<password>"`, or anything else for a direct connection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChannelDefinition {
    /// Diagnostic label
    #[serde(default)]
    pub name: String,

    /// Channel type string
    #[serde(rename = "type", default)]
    pub channel_type: String,

    /// Upstream `host:port` (comma-separated list for Shadowsocks)
    #[serde(default)]
    pub addr: String,
}

impl ChannelDefinition {
    /// Create a direct channel definition
    pub fn direct(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            channel_type: "direct".into(),
            addr: String::new(),
        }
    }

    /// Create a channel definition from its parts
    pub fn new(
        name: impl Into<String>,
        channel_type: impl Into<String>,
        addr: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            channel_type: channel_type.into(),
            addr: addr.into(),
        }
    }

    /// Parse the channel type string
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidChannelType` for a malformed `ss,` type.
    pub fn kind(&self) -> Result<ChannelKind, ConfigError> {
        if ShadowsocksSettings::is_shadowsocks_type(&self.channel_type) {
            let settings = ShadowsocksSettings::parse(&self.channel_type)
                .map_err(|_| ConfigError::invalid_channel_type(&self.name, &self.channel_type))?;
            return Ok(ChannelKind::Shadowsocks {
                method: settings.method,
                password: settings.password,
            });
        }

        Ok(match self.channel_type.as_str() {
            "socks5" => ChannelKind::Socks5,
            "http" => ChannelKind::Http,
            _ => ChannelKind::Direct,
        })
    }

    /// Validate the channel definition
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the type is malformed or a proxy channel has no address.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let kind = self.kind()?;
        if kind.needs_address() && self.addr.trim().is_empty() {
            return Err(ConfigError::validation(format!(
                "Channel '{}' of type {} requires an address",
                self.name, kind
            )));
        }
        if let ChannelKind::Shadowsocks { .. } = kind {
            ShadowsocksSettings::parse_servers(&self.addr)?;
        }
        Ok(())
    }
}

/// Parsed channel type
#[derive(Clone, PartialEq, Eq)]
pub enum ChannelKind {
    /// Dial the destination itself
    Direct,
    /// Tunnel through an upstream HTTP proxy with CONNECT
    Http,
    /// Tunnel through an upstream SOCKS5 server
    Socks5,
    /// Tunnel through a Shadowsocks server pool
    Shadowsocks {
        /// Encryption method
        method: ShadowsocksMethod,
        /// Password
        password: String,
    },
}

impl ChannelKind {
    /// Whether this kind dials an upstream proxy address
    #[must_use]
    pub const fn needs_address(&self) -> bool {
        !matches!(self, Self::Direct)
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Http => write!(f, "http"),
            Self::Socks5 => write!(f, "socks5"),
            Self::Shadowsocks { method, .. } => write!(f, "shadowsocks({method})"),
        }
    }
}

impl std::fmt::Debug for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

/// A domain routing rule
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleConfig {
    /// Domain suffixes; a leading `.` is added when missing
    pub domains: Vec<String>,

    /// Channel used for matching domains
    #[serde(flatten)]
    pub channel: ChannelDefinition,
}

impl RuleConfig {
    /// Validate the rule
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a domain is empty or the channel is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.domains.iter().any(|d| d.trim_start_matches('.').is_empty()) {
            return Err(ConfigError::validation(format!(
                "Channel '{}' has an empty domain entry",
                self.channel.name
            )));
        }
        self.channel.validate()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Include target (module path)
    #[serde(default)]
    pub target: bool,
}

impl LogConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.format.as_str(), "json" | "text") {
            return Err(ConfigError::validation(format!(
                "Unknown log format '{}' (expected json or text)",
                self.format
            )));
        }
        Ok(())
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            target: false,
        }
    }
}

fn default_listen_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 18080))
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}
