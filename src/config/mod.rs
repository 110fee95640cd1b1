//! Configuration module for Gear-Sweep
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use gear_sweep::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("gear-sweep.toml")).unwrap();
//! println!("Worker pool size: {}", config.crawler.pool_size);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, OutputConfig, SearchConfig, SourceEntry, SourceKind};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
