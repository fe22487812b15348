//! CLI configuration handling.

use anyhow::{Context, Result};
use runcoach_core::{StoreConfig, default_config_dir, config::CONFIG_DIR_NAME};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the optional settings file inside the config directory.
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// Override for the OAuth token endpoint.
    pub token_url: Option<String>,

    /// Timeout for a single token exchange, in seconds.
    pub request_timeout_secs: Option<u64>,

    /// Seconds before expiry at which a token is refreshed.
    pub refresh_buffer_secs: Option<i64>,

    /// Logging level used when `RUST_LOG` is not set.
    pub log_level: Option<String>,
}

impl CliConfig {
    /// Build the store configuration for `config_dir`, applying overrides.
    pub fn store_config(&self, config_dir: &Path) -> StoreConfig {
        let mut config = StoreConfig::new(config_dir);
        if let Some(url) = &self.token_url {
            config = config.with_token_url(url.clone());
        }
        if let Some(secs) = self.request_timeout_secs {
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.refresh_buffer_secs {
            config = config.with_refresh_buffer_secs(secs);
        }
        config
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }
}

/// Pick the config directory: explicit flag first, then `~/.running_coach`.
pub fn resolve_config_dir(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(default_config_dir)
        .unwrap_or_else(|| PathBuf::from(CONFIG_DIR_NAME))
}

/// Load `config.toml` from `config_dir`, or defaults if it does not exist.
pub fn load_config(config_dir: &Path) -> Result<CliConfig> {
    let config_path = config_dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(CliConfig::default());
    }

    let contents = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config from {:?}", config_path))?;
    toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config from {:?}", config_path))
}
