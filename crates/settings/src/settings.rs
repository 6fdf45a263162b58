//! Configuration system for shellwatch.
//!
//! Provides compile-time constants and TOML config file support.

pub mod constants;
pub mod file;

pub use file::{config_path, ensure_config_file, load_config, load_config_from, Config, WatchConfig};
