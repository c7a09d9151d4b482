//! Outbound module
//!
//! This module provides the outbound connectors a channel can be bound to.
//!
//! # Outbound Types
//!
//! - `DirectOutbound`: dial the destination itself (5s connect timeout).
//! - `HttpConnectOutbound`: tunnel through an upstream HTTP proxy with CONNECT.
//! - `Socks5Outbound`: tunnel through an upstream SOCKS5 server, obfuscated
//!   when the server selects method `0x81`.
//! - `ShadowsocksOutbound`: tunnel through a Shadowsocks server pool with
//!   cursor-based failover.
//!
//! # Example
//!
//! ```no_run
//! use proxy_gateway::config::ChannelDefinition;
//! use proxy_gateway::outbound::Channel;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let channel = Channel::from_definition(ChannelDefinition::new("up", "socks5", "127.0.0.1:1080"))?;
//! let conn = channel.connect("example.com", 443).await?;
//! println!("Connected via {}", conn.upstream());
//! # Ok(())
//! # }
//! ```

mod channel;
mod direct;
mod http;
mod shadowsocks;
mod socks5;
pub mod socks5_common;
mod traits;

pub use channel::Channel;
pub use direct::{DirectOutbound, DIRECT_CONNECT_TIMEOUT};
pub use http::{http_connect_handshake, HttpConnectOutbound, MAX_RESPONSE_LEN};
pub use self::shadowsocks::{ServerPool, ShadowsocksOutbound, ShadowsocksStream};
pub use socks5::{socks5_handshake, Socks5Outbound};
pub use traits::{host_port, Outbound, OutboundConnection, OutboundStream};
