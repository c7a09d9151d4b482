//! Connection handling module
//!
//! This module provides:
//! - The accept loop, one task per client connection
//! - Protocol dispatch and relay for a single connection
//! - Statistics collection

mod dispatcher;
mod listener;
mod stats;

pub use dispatcher::handle_connection;
pub use listener::run_accept_loop;
pub use stats::{ConnectionStats, StatsSnapshot};
