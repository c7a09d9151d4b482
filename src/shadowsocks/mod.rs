//! Shadowsocks channel support
//!
//! Parsing of `ss,<method>,<password>` channel types and Shadowsocks server
//! lists. The client connector itself lives in `outbound::shadowsocks`.
//!
//! # Supported Methods
//!
//! - **AEAD 2022**: `2022-blake3-aes-256-gcm`, `2022-blake3-aes-128-gcm`,
//!   `2022-blake3-chacha20-poly1305`
//! - **AEAD**: `aes-256-gcm`, `aes-128-gcm`, `chacha20-ietf-poly1305`
//! - `none` (testing only)

mod config;
mod error;

pub use config::{ShadowsocksMethod, ShadowsocksSettings, SHADOWSOCKS_TYPE_PREFIX};
pub use error::ShadowsocksError;
