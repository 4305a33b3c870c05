//! Configuration resolution
//!
//! Resolves configuration from multiple sources with priority:
//! 1. Command-line flags (passed as parameters)
//! 2. Environment variables
//! 3. Config file (`--config` or `MDQ_CONFIG`)
//! 4. Defaults

mod discovery;
mod types;

pub use discovery::{load_config_file, resolve_config, ConfigError, ConfigOverrides};
pub use types::{Config, NotifierKind, QueueConfig};
