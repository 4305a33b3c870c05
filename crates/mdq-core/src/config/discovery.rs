//! Configuration discovery and resolution

use super::types::{Config, NotifierKind, QueueConfig};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading a config file
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// TOML parsing error
    #[error("TOML parsing error in {path}: {source}")]
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Environment variable with an unusable value
    #[error("Invalid value for {name}: {message}")]
    InvalidEnv { name: &'static str, message: String },
}

/// Command-line overrides for configuration
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// Override queue root
    pub path: Option<PathBuf>,
    /// Override arrival subscription
    pub persistent: Option<bool>,
    /// Override notifier backend
    pub notifier: Option<NotifierKind>,
    /// Path to config file override
    pub config_path: Option<PathBuf>,
}

/// Resolve queue configuration from all sources
///
/// Priority (highest to lowest):
/// 1. Command-line overrides
/// 2. Environment variables (`MDQ_PATH`, `MDQ_PERSISTENT`, `MDQ_NOTIFIER`)
/// 3. Config file (`--config` or `MDQ_CONFIG`)
/// 4. Defaults
pub fn resolve_config(overrides: &ConfigOverrides) -> Result<QueueConfig, ConfigError> {
    let mut config = QueueConfig::default();

    // 3. Config file
    let config_path = overrides
        .config_path
        .clone()
        .or_else(|| std::env::var_os("MDQ_CONFIG").map(PathBuf::from));
    if let Some(path) = config_path {
        config = load_config_file(&path)?.queue;
        debug!("Loaded config from {}", path.display());
    }

    // 2. Environment variables
    apply_env_overrides(&mut config)?;

    // 1. Command-line overrides
    apply_cli_overrides(&mut config, overrides);

    Ok(config)
}

/// Load config from a TOML file
pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    toml::from_str(&contents).map_err(|e| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Apply environment variable overrides
fn apply_env_overrides(config: &mut QueueConfig) -> Result<(), ConfigError> {
    if let Some(path) = std::env::var_os("MDQ_PATH") {
        config.path = PathBuf::from(path);
    }

    if let Ok(value) = std::env::var("MDQ_PERSISTENT") {
        config.persistent = parse_bool(&value).ok_or_else(|| ConfigError::InvalidEnv {
            name: "MDQ_PERSISTENT",
            message: format!("expected true/false, got '{value}'"),
        })?;
    }

    if let Ok(value) = std::env::var("MDQ_NOTIFIER") {
        config.notifier = value.parse().map_err(|message| ConfigError::InvalidEnv {
            name: "MDQ_NOTIFIER",
            message,
        })?;
    }

    Ok(())
}

/// Apply command-line overrides
fn apply_cli_overrides(config: &mut QueueConfig, overrides: &ConfigOverrides) {
    if let Some(ref path) = overrides.path {
        config.path = path.clone();
    }

    if let Some(persistent) = overrides.persistent {
        config.persistent = persistent;
    }

    if let Some(notifier) = overrides.notifier {
        config.notifier = notifier;
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
