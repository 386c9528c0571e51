//! CLI command implementations
//!
//! Each pipeline stage is a function here so that the single-stage commands
//! and `run` share one implementation.

pub mod extract;
pub mod init;
pub mod load;
pub mod run;
pub mod transform;
pub mod validate;
pub mod verify;

use anyhow::{Context, Result};
use autosales_core::Config;

/// Load and validate the project configuration
pub fn load_config(config_path: &str) -> Result<Config> {
    tracing::debug!("Loading configuration from {}", config_path);
    Config::load(config_path).context("Failed to load configuration")
}
