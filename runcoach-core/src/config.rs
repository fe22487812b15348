//! Configuration for the credential store.
//!
//! Configuration is resolved before a store is built. The store itself never
//! touches the process environment:
//!
//! 1. [`EnvConfig::load`] reads `.env` and the process environment once.
//! 2. [`ClientCredentials::resolve`] merges explicit values over the
//!    environment and rejects incomplete registrations.
//! 3. [`StoreConfig`] carries the storage directory and token endpoint
//!    settings, defaulting to `~/.running_coach`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::secret::Secret;
use crate::store::{CREDENTIALS_FILE, KEY_FILE};

/// Environment variable holding the Strava client id.
pub const CLIENT_ID_VAR: &str = "STRAVA_CLIENT_ID";

/// Environment variable holding the Strava client secret.
pub const CLIENT_SECRET_VAR: &str = "STRAVA_CLIENT_SECRET";

/// Strava's OAuth token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://www.strava.com/oauth/token";

/// Name of the per-user configuration directory under the home directory.
pub const CONFIG_DIR_NAME: &str = ".running_coach";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Tokens expiring within this many seconds are refreshed ahead of time.
const DEFAULT_REFRESH_BUFFER_SECS: i64 = 300;

/// Error type for configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The client id and/or secret were not supplied.
    #[error(
        "missing required Strava credentials: {}. Set them in a .env file or pass them explicitly",
        .missing.join(", ")
    )]
    MissingClientCredentials { missing: Vec<&'static str> },

    /// The token endpoint is not a valid absolute URL.
    #[error("invalid token URL {url}: {message}")]
    InvalidTokenUrl { url: String, message: String },

    /// The request timeout must be non-zero.
    #[error("request timeout must be greater than zero")]
    InvalidTimeout,

    /// A negative buffer would treat expired tokens as valid.
    #[error("refresh buffer must not be negative (got {secs}s)")]
    InvalidRefreshBuffer { secs: i64 },
}

/// Client registration values sourced from the environment.
///
/// Built once, up front. Tests construct it with [`EnvConfig::from_lookup`]
/// or [`EnvConfig::default`] instead of mutating process state.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<Secret>,
}

impl EnvConfig {
    /// Load values from a `.env` file (if present) and the process environment.
    pub fn load() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!("Ignoring unreadable .env file: {}", e),
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            client_id: non_empty(lookup(CLIENT_ID_VAR)),
            client_secret: non_empty(lookup(CLIENT_SECRET_VAR)).map(Secret::new),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// The OAuth client registration used for token exchange.
///
/// Immutable once built; both values are guaranteed non-empty.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    client_id: String,
    client_secret: Secret,
}

impl ClientCredentials {
    /// Create client credentials from explicit values.
    ///
    /// Fails if either value is empty.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Self::resolve(
            Some(client_id.into()),
            Some(client_secret.into()),
            &EnvConfig::default(),
        )
    }

    /// Resolve client credentials, preferring explicit values over `env`.
    ///
    /// Empty strings count as missing. The error lists every missing
    /// variable by name.
    pub fn resolve(
        client_id: Option<String>,
        client_secret: Option<String>,
        env: &EnvConfig,
    ) -> Result<Self, ConfigError> {
        let client_id = non_empty(client_id).or_else(|| env.client_id.clone());
        let client_secret = non_empty(client_secret)
            .map(Secret::new)
            .or_else(|| env.client_secret.clone());

        match (client_id, client_secret) {
            (Some(client_id), Some(client_secret)) => Ok(Self {
                client_id,
                client_secret,
            }),
            (client_id, client_secret) => {
                let mut missing = Vec::new();
                if client_id.is_none() {
                    missing.push(CLIENT_ID_VAR);
                }
                if client_secret.is_none() {
                    missing.push(CLIENT_SECRET_VAR);
                }
                Err(ConfigError::MissingClientCredentials { missing })
            }
        }
    }

    /// The OAuth client id.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The OAuth client secret.
    pub fn client_secret(&self) -> &Secret {
        &self.client_secret
    }

    /// Whether both values are present.
    pub fn is_complete(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

/// Compute the default configuration directory for a given home directory.
pub fn default_config_dir_in(home: &Path) -> PathBuf {
    home.join(CONFIG_DIR_NAME)
}

/// The default configuration directory, `~/.running_coach`.
///
/// Returns `None` when no home directory can be determined.
pub fn default_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| default_config_dir_in(dirs.home_dir()))
}

/// Settings for a [`CredentialStore`](crate::store::CredentialStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding the key and the encrypted credentials.
    pub config_dir: PathBuf,

    /// OAuth token endpoint used for refreshes.
    pub token_url: String,

    /// Upper bound on a single token exchange request.
    pub request_timeout: Duration,

    /// Seconds before expiry at which a token counts as stale.
    pub refresh_buffer_secs: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let config_dir = default_config_dir().unwrap_or_else(|| PathBuf::from(CONFIG_DIR_NAME));
        Self::new(config_dir)
    }
}

impl StoreConfig {
    /// Create a configuration rooted at `config_dir` with default settings.
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            refresh_buffer_secs: DEFAULT_REFRESH_BUFFER_SECS,
        }
    }

    /// Set the token endpoint.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the refresh buffer in seconds.
    pub fn with_refresh_buffer_secs(mut self, secs: i64) -> Self {
        self.refresh_buffer_secs = secs;
        self
    }

    /// Path of the encryption key file.
    pub fn key_path(&self) -> PathBuf {
        self.config_dir.join(KEY_FILE)
    }

    /// Path of the encrypted credential file.
    pub fn credentials_path(&self) -> PathBuf {
        self.config_dir.join(CREDENTIALS_FILE)
    }

    /// Check the settings for values the store cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.token_url).map_err(|e| ConfigError::InvalidTokenUrl {
            url: self.token_url.clone(),
            message: e.to_string(),
        })?;

        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }

        if self.refresh_buffer_secs < 0 {
            return Err(ConfigError::InvalidRefreshBuffer {
                secs: self.refresh_buffer_secs,
            });
        }

        Ok(())
    }
}
