//! Configuration module for Tidemark
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use tidemark::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("tidemark.toml")).unwrap();
//! println!("Crawl starts at: {}", config.crawl.base_url);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlConfig, ExtractConfig, OutputConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
