//! Configuration module for channel-harvest
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files. Every key has a default, so the file is optional; command-line
//! flags are applied on top of it before validation.
//!
//! # Example
//!
//! ```no_run
//! use channel_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Batch size: {}", config.harvest.batch_size);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{Config, HarvestConfig, HarvestMethod, IndexConfig, SinkConfig, UserAgentConfig};

pub use parser::{compute_config_hash, load_config, parse_config};
pub use validation::validate;
