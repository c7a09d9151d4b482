//! Common SOCKS5 protocol constants and utilities (RFC 1928)
//!
//! Shared by the SOCKS5 client connector and the SOCKS5 inbound handler,
//! including the private `0x81` obfuscated-session method both ends speak.

// ============================================================================
// Protocol Version
// ============================================================================

/// SOCKS5 protocol version (RFC 1928)
pub const SOCKS5_VERSION: u8 = 0x05;

// ============================================================================
// Authentication Methods (RFC 1928 Section 3)
// ============================================================================

/// No authentication required (0x00)
pub const AUTH_METHOD_NONE: u8 = 0x00;

/// Private method (0x81): every byte after the method reply is complemented
pub const AUTH_METHOD_OBFUSCATED: u8 = 0x81;

/// No acceptable methods (0xFF) - server rejects all offered methods
pub const AUTH_METHOD_NO_ACCEPTABLE: u8 = 0xFF;

// ============================================================================
// Commands (RFC 1928 Section 4)
// ============================================================================

/// CONNECT command (0x01) - establish TCP connection
pub const CMD_CONNECT: u8 = 0x01;

// ============================================================================
// Address Types (RFC 1928 Section 4)
// ============================================================================

/// IPv4 address (4 bytes)
pub const ATYP_IPV4: u8 = 0x01;

/// Domain name (1 byte length + N bytes name)
pub const ATYP_DOMAIN: u8 = 0x03;

/// IPv6 address (16 bytes)
pub const ATYP_IPV6: u8 = 0x04;

/// IPv4 address size in bytes
pub const IPV4_ADDR_SIZE: usize = 4;

/// IPv6 address size in bytes
pub const IPV6_ADDR_SIZE: usize = 16;

// ============================================================================
// Reply Codes (RFC 1928 Section 6)
// ============================================================================

/// Succeeded (0x00)
pub const REPLY_SUCCEEDED: u8 = 0x00;

/// General SOCKS server failure (0x01)
pub const REPLY_GENERAL_FAILURE: u8 = 0x01;

/// Connection not allowed by ruleset (0x02)
pub const REPLY_NOT_ALLOWED: u8 = 0x02;

/// Network unreachable (0x03)
pub const REPLY_NETWORK_UNREACHABLE: u8 = 0x03;

/// Host unreachable (0x04)
pub const REPLY_HOST_UNREACHABLE: u8 = 0x04;

/// Connection refused (0x05)
pub const REPLY_CONNECTION_REFUSED: u8 = 0x05;

/// TTL expired (0x06)
pub const REPLY_TTL_EXPIRED: u8 = 0x06;

/// Command not supported (0x07)
pub const REPLY_COMMAND_NOT_SUPPORTED: u8 = 0x07;

/// Address type not supported (0x08)
pub const REPLY_ADDRESS_TYPE_NOT_SUPPORTED: u8 = 0x08;

/// Length of a CONNECT reply carrying an IPv4 bound address
pub const CONNECT_REPLY_LEN: usize = 10;

/// Success reply sent by the inbound handler; the bound address is not reported
pub const CONNECT_REPLY_SUCCESS: [u8; CONNECT_REPLY_LEN] = [
    SOCKS5_VERSION,
    REPLY_SUCCEEDED,
    0x00,
    ATYP_IPV4,
    0,
    0,
    0,
    0,
    0,
    0,
];

// ============================================================================
// Utility Functions
// ============================================================================

/// Convert reply code to human-readable message
#[must_use]
pub const fn reply_message(code: u8) -> &'static str {
    match code {
        REPLY_SUCCEEDED => "succeeded",
        REPLY_GENERAL_FAILURE => "general SOCKS server failure",
        REPLY_NOT_ALLOWED => "connection not allowed by ruleset",
        REPLY_NETWORK_UNREACHABLE => "network unreachable",
        REPLY_HOST_UNREACHABLE => "host unreachable",
        REPLY_CONNECTION_REFUSED => "connection refused",
        REPLY_TTL_EXPIRED => "TTL expired",
        REPLY_COMMAND_NOT_SUPPORTED => "command not supported",
        REPLY_ADDRESS_TYPE_NOT_SUPPORTED => "address type not supported",
        _ => "unknown error",
    }
}
