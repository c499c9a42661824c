//! Configuration module for Ripple-Fetch
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use ripple_fetch::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("ripple.toml")).unwrap();
//! println!("Default strategy: {}", config.strategy.default);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BackendsConfig, BrowserBackendConfig, CircuitBreakerSettings, Config, CredentialEntry,
    DiscoveryConfig, DomainLimitEntry, FetchConfig, RemoteBackendConfig, RuleEntry,
    SchedulerConfig, StrategyConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate_domain_pattern;
