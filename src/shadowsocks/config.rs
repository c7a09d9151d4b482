//! Shadowsocks configuration types
//!
//! A Shadowsocks channel is declared with a type string of the form
//! `ss,<method>,<password>` and an address holding one or more comma-separated
//! `host:port` servers. This module parses both halves.
//!
//! # Example
//!
//! ```
//! use proxy_gateway::shadowsocks::{ShadowsocksMethod, ShadowsocksSettings};
//!
//! let settings = ShadowsocksSettings::parse("ss,aes-256-gcm,secret").unwrap();
//! assert_eq!(settings.method, ShadowsocksMethod::Aes256Gcm);
//! assert_eq!(settings.password, "secret");
//!
//! let servers = ShadowsocksSettings::parse_servers("10.0.0.1:8388,10.0.0.2:8388").unwrap();
//! assert_eq!(servers.len(), 2);
//! ```

use serde::{Deserialize, Serialize};
use shadowsocks::crypto::CipherKind;

use super::error::ShadowsocksError;

/// Prefix that marks a channel type string as Shadowsocks
pub const SHADOWSOCKS_TYPE_PREFIX: &str = "ss,";

/// Shadowsocks encryption method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShadowsocksMethod {
    // AEAD 2022
    /// 2022-blake3-aes-256-gcm
    #[serde(rename = "2022-blake3-aes-256-gcm")]
    Aead2022Blake3Aes256Gcm,

    /// 2022-blake3-aes-128-gcm
    #[serde(rename = "2022-blake3-aes-128-gcm")]
    Aead2022Blake3Aes128Gcm,

    /// 2022-blake3-chacha20-poly1305
    #[serde(rename = "2022-blake3-chacha20-poly1305")]
    Aead2022Blake3Chacha20Poly1305,

    // AEAD v1
    /// aes-256-gcm
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,

    /// aes-128-gcm
    #[serde(rename = "aes-128-gcm")]
    Aes128Gcm,

    /// chacha20-ietf-poly1305
    #[serde(rename = "chacha20-ietf-poly1305")]
    Chacha20IetfPoly1305,

    /// No encryption (for testing only, NOT SECURE)
    #[serde(rename = "none")]
    None,
}

impl ShadowsocksMethod {
    /// Convert to shadowsocks `CipherKind`
    #[must_use]
    pub const fn to_cipher_kind(self) -> CipherKind {
        match self {
            Self::Aead2022Blake3Aes256Gcm => CipherKind::AEAD2022_BLAKE3_AES_256_GCM,
            Self::Aead2022Blake3Aes128Gcm => CipherKind::AEAD2022_BLAKE3_AES_128_GCM,
            Self::Aead2022Blake3Chacha20Poly1305 => CipherKind::AEAD2022_BLAKE3_CHACHA20_POLY1305,
            Self::Aes256Gcm => CipherKind::AES_256_GCM,
            Self::Aes128Gcm => CipherKind::AES_128_GCM,
            Self::Chacha20IetfPoly1305 => CipherKind::CHACHA20_POLY1305,
            Self::None => CipherKind::NONE,
        }
    }

    /// Get the method name as a string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Aead2022Blake3Aes256Gcm => "2022-blake3-aes-256-gcm",
            Self::Aead2022Blake3Aes128Gcm => "2022-blake3-aes-128-gcm",
            Self::Aead2022Blake3Chacha20Poly1305 => "2022-blake3-chacha20-poly1305",
            Self::Aes256Gcm => "aes-256-gcm",
            Self::Aes128Gcm => "aes-128-gcm",
            Self::Chacha20IetfPoly1305 => "chacha20-ietf-poly1305",
            Self::None => "none",
        }
    }

    /// Parse method from string (case-insensitive)
    ///
    /// # Errors
    ///
    /// Returns an error if the method string is not recognized.
    pub fn parse_method(s: &str) -> Result<Self, ShadowsocksError> {
        match s.to_lowercase().as_str() {
            "2022-blake3-aes-256-gcm" => Ok(Self::Aead2022Blake3Aes256Gcm),
            "2022-blake3-aes-128-gcm" => Ok(Self::Aead2022Blake3Aes128Gcm),
            "2022-blake3-chacha20-poly1305" => Ok(Self::Aead2022Blake3Chacha20Poly1305),
            "aes-256-gcm" => Ok(Self::Aes256Gcm),
            "aes-128-gcm" => Ok(Self::Aes128Gcm),
            "chacha20-ietf-poly1305" | "chacha20-poly1305" => Ok(Self::Chacha20IetfPoly1305),
            "none" | "plain" => Ok(Self::None),
            _ => Err(ShadowsocksError::InvalidMethod(s.to_string())),
        }
    }
}

impl std::fmt::Display for ShadowsocksMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ShadowsocksMethod {
    type Err = ShadowsocksError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_method(s)
    }
}

/// Method and password carried by a `ss,<method>,<password>` channel type
#[derive(Clone, PartialEq, Eq)]
pub struct ShadowsocksSettings {
    /// Encryption method
    pub method: ShadowsocksMethod,
    /// Password (may itself contain commas)
    pub password: String,
}

impl ShadowsocksSettings {
    /// Check whether a channel type string selects Shadowsocks
    #[must_use]
    pub fn is_shadowsocks_type(channel_type: &str) -> bool {
        channel_type.starts_with(SHADOWSOCKS_TYPE_PREFIX)
    }

    /// Parse `ss,<method>,<password>`
    ///
    /// The string is split into at most three fields, so everything after the
    /// second comma belongs to the password.
    ///
    /// # Errors
    ///
    /// Returns an error if there are fewer than three fields, the method is
    /// unknown, or the password is empty for an encrypting method.
    pub fn parse(channel_type: &str) -> Result<Self, ShadowsocksError> {
        let parts: Vec<&str> = channel_type.splitn(3, ',').collect();
        if parts.len() != 3 || parts[0] != "ss" {
            return Err(ShadowsocksError::ConfigError(format!(
                "expected 'ss,<method>,<password>', got '{channel_type}'"
            )));
        }

        let method = ShadowsocksMethod::parse_method(parts[1])?;
        let password = parts[2].to_string();
        if password.is_empty() && method != ShadowsocksMethod::None {
            return Err(ShadowsocksError::InvalidPassword(
                "password cannot be empty".into(),
            ));
        }

        Ok(Self { method, password })
    }

    /// Split a comma-separated server list into `(host, port)` pairs
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty or any entry is not `host:port`.
    pub fn parse_servers(addr: &str) -> Result<Vec<(String, u16)>, ShadowsocksError> {
        let servers = addr
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_server)
            .collect::<Result<Vec<_>, _>>()?;

        if servers.is_empty() {
            return Err(ShadowsocksError::InvalidServerAddress(addr.to_string()));
        }
        Ok(servers)
    }
}

impl std::fmt::Debug for ShadowsocksSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadowsocksSettings")
            .field("method", &self.method)
            .field("password", &"***")
            .finish()
    }
}

/// Parse one `host:port` entry; IPv6 hosts may be bracketed
fn parse_server(entry: &str) -> Result<(String, u16), ShadowsocksError> {
    let invalid = || ShadowsocksError::InvalidServerAddress(entry.to_string());

    let (host, port) = entry.rsplit_once(':').ok_or_else(invalid)?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let port: u16 = port.parse().map_err(|_| invalid())?;
    if host.is_empty() || port == 0 {
        return Err(invalid());
    }
    Ok((host.to_string(), port))
}
