//! I/O utilities for proxy-gateway
//!
//! - [`XorStream`]: byte-complement obfuscation negotiated by SOCKS5 method `0x81`
//! - [`PrefixedStream`]: replays bytes consumed during protocol detection
//! - [`relay`]: bidirectional copy with joint teardown

mod copy;
mod obfs;
mod prefixed;

pub use copy::{relay, CopyResult, DEFAULT_BUFFER_SIZE};
pub use obfs::{complement, complement_in_place, XorStream};
pub use prefixed::PrefixedStream;
