//! Startup configuration assembly.
//!
//! # Design Decisions
//! - Fail fast: any config error is fatal before the listener binds
//! - CLI overrides are applied before validation so they are checked too

use std::path::Path;

use crate::config::loader::{load_config, ConfigError};
use crate::config::validation::validate_config;
use crate::config::ProxyConfig;

/// Load the config file (or defaults) and apply the `--bind` override.
pub fn load_startup_config(path: Option<&Path>, bind: Option<String>) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    if let Some(bind) = bind {
        config.listener.bind_address = bind;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    Ok(config)
}
