//! Shadowsocks error types
//!
//! Errors raised while turning a `ss,<method>,<password>` channel definition
//! into a usable Shadowsocks server pool.

use std::fmt;

use crate::error::ConfigError;

/// Shadowsocks-specific configuration errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShadowsocksError {
    /// Invalid encryption method specified
    InvalidMethod(String),

    /// Invalid or missing password
    InvalidPassword(String),

    /// Server address is not `host:port`
    InvalidServerAddress(String),

    /// Channel type string is not `ss,<method>,<password>`
    ConfigError(String),
}

impl fmt::Display for ShadowsocksError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMethod(method) => {
                write!(f, "invalid Shadowsocks encryption method: {method}")
            }
            Self::InvalidPassword(reason) => {
                write!(f, "invalid Shadowsocks password: {reason}")
            }
            Self::InvalidServerAddress(addr) => {
                write!(f, "invalid Shadowsocks server address: {addr}")
            }
            Self::ConfigError(msg) => {
                write!(f, "Shadowsocks configuration error: {msg}")
            }
        }
    }
}

impl std::error::Error for ShadowsocksError {}

impl From<ShadowsocksError> for ConfigError {
    fn from(e: ShadowsocksError) -> Self {
        ConfigError::ValidationError(e.to_string())
    }
}
