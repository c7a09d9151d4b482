//! Channel routing with a shared domain cache
//!
//! The routing table is built once from configuration and never changes.
//! `ChannelRouter` adds a process-wide cache in front of it:
//!
//! ```text
//! resolve(domain)
//!   -> cache read lock: hit? return
//!   -> scan rules in order, first matching domain wins (else default)
//!   -> cache write lock: insert if absent
//! ```
//!
//! The scan and the insert are not one atomic step; two concurrent misses
//! for the same domain may both scan, and the first insert wins.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use super::domain::DomainSet;
use crate::config::Config;
use crate::error::ConfigError;
use crate::outbound::Channel;

/// One routing rule: domain suffixes and the channel they select
#[derive(Debug, Clone)]
pub struct RoutingRule {
    /// Normalized domain suffixes
    pub domains: DomainSet,
    /// Channel for matching destinations
    pub channel: Arc<Channel>,
}

impl RoutingRule {
    /// Create a rule from configured domains
    pub fn new<I, S>(domains: I, channel: Arc<Channel>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            domains: DomainSet::new(domains),
            channel,
        }
    }
}

/// Ordered rules plus the SOCKS5 and default channels
#[derive(Debug, Clone)]
pub struct RoutingTable {
    /// Rules in configuration order; first match wins
    pub rules: Vec<RoutingRule>,
    /// Channel for SOCKS5 clients that negotiated no authentication
    pub socks5: Arc<Channel>,
    /// Channel used when no rule matches
    pub default: Arc<Channel>,
}

impl RoutingTable {
    /// Create a table from prepared parts
    pub fn new(rules: Vec<RoutingRule>, socks5: Arc<Channel>, default: Arc<Channel>) -> Self {
        Self {
            rules,
            socks5,
            default,
        }
    }

    /// Build the table and every channel's connector from configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any channel definition is invalid.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let rules = config
            .channels
            .iter()
            .map(|rule| -> Result<RoutingRule, ConfigError> {
                let channel = Channel::from_definition(rule.channel.clone())?;
                Ok(RoutingRule::new(&rule.domains, Arc::new(channel)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let socks5 = Arc::new(Channel::from_definition(config.socks5.clone())?);
        let default = Arc::new(Channel::from_definition(config.default.clone())?);

        Ok(Self::new(rules, socks5, default))
    }

    /// Scan the rules for `domain`, falling back to the default channel
    #[must_use]
    pub fn lookup(&self, domain: &str) -> &Arc<Channel> {
        self.rules
            .iter()
            .find(|rule| rule.domains.matches(domain))
            .map_or(&self.default, |rule| &rule.channel)
    }
}

/// Resolves destination domains to channels, caching every decision
#[derive(Debug)]
pub struct ChannelRouter {
    /// Routing table, immutable after construction
    table: RoutingTable,
    /// Destination domain (as received) to chosen channel; never evicted
    cache: RwLock<HashMap<String, Arc<Channel>>>,
}

impl ChannelRouter {
    /// Create a router over `table` with an empty cache
    #[must_use]
    pub fn new(table: RoutingTable) -> Self {
        Self {
            table,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Build the table from configuration and wrap it in a router
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any channel definition is invalid.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::new(RoutingTable::from_config(config)?))
    }

    /// Resolve the channel for `domain`
    ///
    /// Never fails: an unmatched domain routes to the default channel. The
    /// first decision for a domain is cached and reused for the process
    /// lifetime.
    pub fn resolve(&self, domain: &str) -> Arc<Channel> {
        if let Some(channel) = self.cache.read().get(domain) {
            trace!("Route cache hit: {} -> {}", domain, channel.name());
            return Arc::clone(channel);
        }

        let channel = Arc::clone(self.table.lookup(domain));

        let mut cache = self.cache.write();
        let channel = Arc::clone(cache.entry(domain.to_string()).or_insert(channel));
        debug!("Route {} -> {} ({})", domain, channel.name(), channel.outbound_type());
        channel
    }

    /// Channel for SOCKS5 clients that negotiated no authentication
    #[must_use]
    pub fn socks5_channel(&self) -> Arc<Channel> {
        Arc::clone(&self.table.socks5)
    }

    /// Fallback channel
    #[must_use]
    pub fn default_channel(&self) -> Arc<Channel> {
        Arc::clone(&self.table.default)
    }

    /// Cached decision for `domain`, if any
    #[must_use]
    pub fn cached(&self, domain: &str) -> Option<Arc<Channel>> {
        self.cache.read().get(domain).cloned()
    }

    /// Number of cached domains
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.read().len()
    }

    /// Routing table
    #[must_use]
    pub const fn table(&self) -> &RoutingTable {
        &self.table
    }
}
