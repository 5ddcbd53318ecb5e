//! # Configuration Modules
//!
//! Layered JSON runtime configuration shared by the binaries.

/// Provides system-level configuration management.
pub mod config_sys;

pub use config_sys::{get_runtime_config, load_runtime_config, RuntimeConfig, RuntimeConfigError};
