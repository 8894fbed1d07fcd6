// SPDX-License-Identifier: MIT

//! Config file loading for `poolctl` (spec.md §6 "Configuration"): an
//! optional `--config <path>` TOML file overlaid on `PoolConfig::default`,
//! with CLI flags layered on top of that.

use pool_engine::PoolConfig;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, #[source] source: toml::de::Error },
}

/// Load `PoolConfig` from an optional TOML file, falling back to the
/// built-in default when no path is given. Every field in `PoolConfig` is
/// `#[serde(default)]`, so a config file only needs to name the fields it
/// wants to override.
pub fn load_config(path: Option<&Path>) -> Result<PoolConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(PoolConfig::default());
    };
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })
}

/// Apply the CLI's explicit overrides on top of a loaded config.
pub fn apply_overrides(mut config: PoolConfig, max_workers: Option<usize>, socket_dir: Option<&Path>) -> PoolConfig {
    if let Some(max_workers) = max_workers {
        config.max_workers = max_workers;
    }
    if let Some(socket_dir) = socket_dir {
        config.socket_dir = socket_dir.to_path_buf();
    }
    config
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
