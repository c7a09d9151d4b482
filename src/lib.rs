//! proxy-gateway: multi-protocol forward proxy with domain-based channels
//!
//! A single listening port accepts HTTP CONNECT, plain HTTP proxy and SOCKS5
//! clients. Each destination domain is routed to a channel, and the channel
//! reaches the destination directly or through an upstream HTTP, SOCKS5 or
//! Shadowsocks proxy.
//!
//! # Features
//!
//! - **Protocol detection**: the first three bytes select the inbound handler
//! - **Domain channels**: ordered suffix rules with a process-wide decision cache
//! - **Obfuscated SOCKS5**: private method `0x81` complements every byte, both
//!   as a server and when chaining to another gateway
//! - **Shadowsocks failover**: a server pool whose cursor advances on dial failure
//!
//! # Architecture
//!
//! ```text
//! Client → dispatcher → inbound handler → ChannelRouter → Channel → Upstream
//!                                                             ↓
//!                                 relay (client ⇄ upstream, joint teardown)
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use proxy_gateway::config::load_config;
//! use proxy_gateway::connection::{run_accept_loop, ConnectionStats};
//! use proxy_gateway::rules::ChannelRouter;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("proxy-gateway.json")?;
//! let router = Arc::new(ChannelRouter::from_config(&config)?);
//! let listener = tokio::net::TcpListener::bind(config.listen.address).await?;
//!
//! run_accept_loop(
//!     listener,
//!     router,
//!     Arc::new(ConnectionStats::new()),
//!     CancellationToken::new(),
//! )
//! .await;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration types and loading
//! - [`connection`]: Accept loop, dispatch and statistics
//! - [`error`]: Error types
//! - [`inbound`]: HTTP CONNECT, HTTP proxy and SOCKS5 handlers
//! - [`io`]: Obfuscation, prefix replay and relay
//! - [`outbound`]: Channel connectors
//! - [`rules`]: Domain routing and cache
//! - [`shadowsocks`]: Shadowsocks channel type parsing

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod connection;
pub mod error;
pub mod inbound;
pub mod io;
pub mod outbound;
pub mod rules;
pub mod shadowsocks;

// Re-export commonly used types at the crate root
pub use config::{ChannelDefinition, Config};
pub use connection::{handle_connection, run_accept_loop, ConnectionStats};
pub use error::{ConfigError, GatewayError, InboundError, OutboundError};
pub use outbound::{Channel, Outbound, OutboundConnection};
pub use rules::ChannelRouter;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
