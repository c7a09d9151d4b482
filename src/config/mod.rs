//! Configuration module for proxy-gateway
//!
//! This module provides configuration types and loading utilities.
//!
//! # Example
//!
//! ```no_run
//! use proxy_gateway::config::load_config;
//!
//! let config = load_config("proxy-gateway.json").unwrap();
//! println!("Default channel: {}", config.default.name);
//! ```

mod loader;
mod types;

pub use loader::{
    create_default_config, load_config, load_config_str, load_config_with_env, ENV_LISTEN_ADDR,
    ENV_LOG_LEVEL,
};
pub use types::{ChannelDefinition, ChannelKind, Config, ListenConfig, LogConfig, RuleConfig};
