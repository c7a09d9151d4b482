//! Error types for proxy-gateway
//!
//! This module defines the error hierarchy for the gateway. Errors are grouped
//! by subsystem: configuration, outbound connectors and inbound protocol handlers.
//! None of them is fatal to the process once the gateway is running; they are
//! logged and the affected connection is dropped.

use std::io;

use thiserror::Error;

/// Top-level error type for proxy-gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration errors (file parsing, validation, channel type strings)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Outbound connector errors
    #[error("Outbound error: {0}")]
    Outbound(#[from] OutboundError),

    /// Inbound protocol errors
    #[error("Inbound error: {0}")]
    Inbound(#[from] InboundError),

    /// I/O errors not covered by other categories
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl GatewayError {
    /// Check if the connection was closed by the peer rather than failing
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        let kind = match self {
            Self::Io(e) | Self::Inbound(InboundError::IoError(e)) => e.kind(),
            _ => return false,
        };
        matches!(
            kind,
            io::ErrorKind::UnexpectedEof
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::ConnectionAborted
        )
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File not found or inaccessible
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Validation error (invalid values, missing required fields)
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    /// Environment variable error
    #[error("Environment variable error: {name}: {reason}")]
    EnvError { name: String, reason: String },

    /// Malformed channel type string
    #[error("Invalid type '{value}' for channel '{name}'")]
    InvalidChannelType { name: String, value: String },

    /// I/O error while reading config
    #[error("I/O error reading configuration: {0}")]
    IoError(#[from] io::Error),
}

impl ConfigError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create an invalid channel type error
    pub fn invalid_channel_type(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidChannelType {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Outbound connection errors
#[derive(Debug, Error)]
pub enum OutboundError {
    /// Dial or handshake I/O failed
    #[error("Failed to connect to {addr}: {reason}")]
    ConnectionFailed { addr: String, reason: String },

    /// Dial or handshake did not finish in time
    #[error("Connection to {addr} timed out after {timeout_secs}s")]
    Timeout { addr: String, timeout_secs: u64 },

    /// Upstream HTTP proxy answered CONNECT with a non-2xx status
    #[error("HTTP proxy {addr} rejected CONNECT: {status_line}")]
    HttpConnectRejected { addr: String, status_line: String },

    /// Upstream HTTP proxy response header exceeded the size limit
    #[error("HTTP proxy {addr} response too long (limit {limit} bytes)")]
    ResponseTooLong { addr: String, limit: usize },

    /// Upstream SOCKS5 server failed the handshake or the CONNECT request
    #[error("SOCKS5 error from {addr}: {reason}")]
    Socks5 { addr: String, reason: String },

    /// Shadowsocks server could not be reached
    #[error("Shadowsocks connection to {server} failed: {reason}")]
    Shadowsocks { server: String, reason: String },

    /// Destination cannot be encoded for this upstream
    #[error("Invalid destination: {0}")]
    InvalidDestination(String),

    /// I/O error during connection
    #[error("Outbound I/O error: {0}")]
    IoError(#[from] io::Error),
}

impl OutboundError {
    /// Create a connection failed error
    pub fn connection_failed(addr: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            addr: addr.into(),
            reason: reason.into(),
        }
    }

    /// Create a SOCKS5 error
    pub fn socks5(addr: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Socks5 {
            addr: addr.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error is an upstream rejection (as opposed to a transport failure)
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::HttpConnectRejected { .. } | Self::Socks5 { .. } | Self::Shadowsocks { .. }
        )
    }
}

/// Inbound protocol errors
#[derive(Debug, Error)]
pub enum InboundError {
    /// First bytes do not match any supported protocol
    #[error("Unknown protocol (first byte {0:#04x})")]
    UnknownProtocol(u8),

    /// Malformed request
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Port missing, not numeric or out of range
    #[error("Invalid port: {0:?}")]
    InvalidPort(String),

    /// SOCKS5 client offered neither 0x00 nor 0x81
    #[error("No acceptable SOCKS5 authentication method")]
    NoAcceptableMethod,

    /// SOCKS5 command other than CONNECT
    #[error("Unsupported SOCKS5 command: {0:#04x}")]
    UnsupportedCommand(u8),

    /// SOCKS5 address type other than IPv4, domain or IPv6
    #[error("Unsupported SOCKS5 address type: {0:#04x}")]
    UnsupportedAddressType(u8),

    /// I/O error
    #[error("Inbound I/O error: {0}")]
    IoError(#[from] io::Error),
}

impl InboundError {
    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}

/// Type alias for Result with GatewayError
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OutboundError::connection_failed("127.0.0.1:80", "connection refused");
        let msg = err.to_string();
        assert!(msg.contains("127.0.0.1:80"));
        assert!(msg.contains("connection refused"));

        let err = ConfigError::invalid_channel_type("hk", "ss,aes-256-gcm");
        assert!(err.to_string().contains("ss,aes-256-gcm"));
        assert!(err.to_string().contains("hk"));

        let err = InboundError::UnknownProtocol(0x16);
        assert!(err.to_string().contains("0x16"));
    }

    #[test]
    fn test_rejection_classification() {
        assert!(OutboundError::socks5("127.0.0.1:1080", "host unreachable").is_rejection());
        assert!(OutboundError::HttpConnectRejected {
            addr: "127.0.0.1:3128".into(),
            status_line: "HTTP/1.1 403 Forbidden".into(),
        }
        .is_rejection());
        assert!(!OutboundError::Timeout {
            addr: "127.0.0.1:3128".into(),
            timeout_secs: 10,
        }
        .is_rejection());
    }

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        let err: GatewayError = InboundError::from(io_err).into();
        assert!(err.is_disconnect());

        let err: GatewayError = ConfigError::validation("bad").into();
        assert!(!err.is_disconnect());
    }
}
