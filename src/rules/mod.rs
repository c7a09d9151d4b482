//! Domain routing for proxy-gateway
//!
//! This module provides:
//! - Domain suffix matching ([`domain`])
//! - The routing table and cached channel router ([`engine`])
//!
//! # Architecture
//!
//! Rules are checked in configuration order and the first rule with a
//! matching domain selects the channel. Destinations no rule matches use the
//! default channel. SOCKS5 clients that negotiated no authentication skip
//! the rules and use the dedicated SOCKS5 channel.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use proxy_gateway::config::ChannelDefinition;
//! use proxy_gateway::outbound::Channel;
//! use proxy_gateway::rules::{ChannelRouter, RoutingRule, RoutingTable};
//!
//! let channel = |name: &str| Arc::new(Channel::from_definition(ChannelDefinition::direct(name)).unwrap());
//! let table = RoutingTable::new(
//!     vec![RoutingRule::new(["google.com"], channel("proxy"))],
//!     channel("socks5"),
//!     channel("direct"),
//! );
//! let router = ChannelRouter::new(table);
//!
//! assert_eq!(router.resolve("mail.google.com").name(), "proxy");
//! assert_eq!(router.resolve("example.com").name(), "direct");
//! ```

pub mod domain;
pub mod engine;

pub use domain::{matches_suffix, normalize_suffix, DomainSet};
pub use engine::{ChannelRouter, RoutingRule, RoutingTable};
