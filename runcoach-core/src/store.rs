//! Encrypted on-disk credential storage with refresh on demand.
//!
//! # Layout
//!
//! ```text
//! <config_dir>/
//!   .key           32 raw key bytes, mode 0600
//!   strava_creds   encrypted JSON record, mode 0600
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use runcoach_core::{ClientCredentials, CredentialStore, Credentials, StoreConfig};
//!
//! let client = ClientCredentials::new("12345", "client-secret")?;
//! let store = CredentialStore::open(StoreConfig::new("/tmp/coach"), client)?;
//!
//! store.save(&Credentials::new("access", "refresh", 1_900_000_000))?;
//! let token = store.get_valid_token().await?;
//! ```

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

use crate::config::{ClientCredentials, EnvConfig, StoreConfig};
use crate::crypto::EncryptionKey;
use crate::error::CoachError;
use crate::exchange::TokenExchange;
use crate::model::{CredentialStatus, Credentials};
use crate::secret::Secret;
use crate::token::{AccessTokenProvider, TokenError};

/// File name of the encryption key inside the config directory.
pub const KEY_FILE: &str = ".key";

/// File name of the encrypted credential record.
pub const CREDENTIALS_FILE: &str = "strava_creds";

/// Error type for credential storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error reading or writing the store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The key file exists but does not hold a usable key.
    #[error("invalid encryption key: {message}")]
    InvalidKey { message: String },

    /// The stored record cannot be decrypted or decoded.
    ///
    /// Usually means the key changed since the record was written. Treat the
    /// store as empty and re-authenticate.
    #[error("stored credentials are unreadable: {message}")]
    Corrupted { message: String },

    /// Encrypting a record failed.
    #[error("encryption failed: {message}")]
    Encryption { message: String },

    /// Serializing a record failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Create `path` for writing with owner-only permissions.
///
/// Fails with `AlreadyExists` if the file is already there. On Unix the mode
/// is applied by `open(2)` itself, so the file never exists with wider access.
pub(crate) fn create_owner_only(path: &Path) -> std::io::Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

/// Write `contents` to a fresh owner-only temp file next to `target`.
///
/// The caller moves it into place and removes it on failure.
pub(crate) fn write_temp_file(target: &Path, contents: &[u8]) -> Result<PathBuf, StoreError> {
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = target.with_file_name(format!("{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    let written = create_owner_only(&tmp).and_then(|mut file| {
        file.write_all(contents)?;
        file.sync_all()
    });

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(tmp)
}

/// Durable, encrypted storage for one Strava token pair.
///
/// The key is loaded once at construction and kept for the lifetime of the
/// store. No locking is done: with several writers the last one wins, and
/// writes go through a rename so readers never see a half-written file.
#[derive(Debug)]
pub struct CredentialStore {
    config: StoreConfig,
    client: ClientCredentials,
    key: EncryptionKey,
    exchange: TokenExchange,
}

impl CredentialStore {
    /// Open (or initialize) the store described by `config`.
    ///
    /// Creates the directory and the encryption key if they do not exist.
    pub fn open(config: StoreConfig, client: ClientCredentials) -> Result<Self, CoachError> {
        config.validate()?;

        fs::create_dir_all(&config.config_dir).map_err(StoreError::from)?;

        let key = EncryptionKey::load_or_create(&config.key_path())?;
        let exchange = TokenExchange::new(config.token_url.clone(), config.request_timeout)?;

        tracing::debug!("Opened credential store at {}", config.config_dir.display());

        Ok(Self {
            config,
            client,
            key,
            exchange,
        })
    }

    /// Open a store from optional explicit values, falling back to `env`
    /// for the client registration and to `~/.running_coach` for the directory.
    pub fn from_parts(
        config_dir: Option<PathBuf>,
        client_id: Option<String>,
        client_secret: Option<String>,
        env: &EnvConfig,
    ) -> Result<Self, CoachError> {
        let client = ClientCredentials::resolve(client_id, client_secret, env)?;
        let config = match config_dir {
            Some(dir) => StoreConfig::new(dir),
            None => StoreConfig::default(),
        };
        Self::open(config, client)
    }

    /// The directory holding the key and credentials.
    pub fn config_dir(&self) -> &Path {
        &self.config.config_dir
    }

    /// Path of the encryption key file.
    pub fn key_path(&self) -> PathBuf {
        self.config.key_path()
    }

    /// Path of the encrypted credential file.
    pub fn credentials_path(&self) -> PathBuf {
        self.config.credentials_path()
    }

    /// Encrypt and persist `credentials`, replacing any prior record.
    pub fn save(&self, credentials: &Credentials) -> Result<(), StoreError> {
        let json = zeroize::Zeroizing::new(serde_json::to_vec(credentials)?);
        let blob = self.key.encrypt(&json)?;

        let target = self.credentials_path();
        let tmp = write_temp_file(&target, &blob)?;

        if let Err(e) = fs::rename(&tmp, &target) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        tracing::debug!("Saved credentials to {}", target.display());
        Ok(())
    }

    /// Load and decrypt the stored record.
    ///
    /// Returns `Ok(None)` if nothing has been saved yet.
    pub fn load(&self) -> Result<Option<Credentials>, StoreError> {
        let blob = match fs::read(self.credentials_path()) {
            Ok(blob) => blob,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let json = self.key.decrypt(&blob)?;
        let credentials =
            serde_json::from_slice(&json).map_err(|e| StoreError::Corrupted {
                message: format!("malformed credential record: {}", e),
            })?;

        Ok(Some(credentials))
    }

    /// Whether the token must be refreshed before use.
    ///
    /// True when nothing is stored or the token expires within the refresh
    /// buffer (5 minutes by default).
    pub fn needs_refresh(&self) -> Result<bool, StoreError> {
        self.needs_refresh_at(Utc::now().timestamp())
    }

    /// [`needs_refresh`](Self::needs_refresh) evaluated at `now` (epoch seconds).
    pub fn needs_refresh_at(&self, now: i64) -> Result<bool, StoreError> {
        Ok(self.status_at(now)?.needs_refresh())
    }

    /// Where the store sits in its lifecycle right now.
    pub fn status(&self) -> Result<CredentialStatus, StoreError> {
        self.status_at(Utc::now().timestamp())
    }

    fn status_at(&self, now: i64) -> Result<CredentialStatus, StoreError> {
        Ok(match self.load()? {
            None => CredentialStatus::Missing,
            Some(creds) if creds.expires_within(self.config.refresh_buffer_secs, now) => {
                CredentialStatus::Stale {
                    expires_at: creds.expires_at,
                }
            }
            Some(creds) => CredentialStatus::Valid {
                expires_at: creds.expires_at,
            },
        })
    }

    /// Exchange the stored refresh token for a new token pair and persist it.
    ///
    /// The whole record is replaced, including the refresh token, since the
    /// provider may rotate it. On failure the stored record is untouched.
    pub async fn refresh(&self) -> Result<(), TokenError> {
        if !self.client.is_complete() {
            return Err(TokenError::NotConfigured);
        }

        let current = self.load()?.ok_or(TokenError::NotFound)?;

        tracing::info!("Refreshing Strava access token");

        let refreshed = match self.exchange.refresh(&self.client, &current.refresh_token).await {
            Ok(creds) => creds,
            Err(e) => {
                tracing::error!("Failed to refresh access token: {}", e);
                return Err(e);
            }
        };

        self.save(&refreshed)?;

        tracing::info!(
            "Refreshed access token, valid until {}",
            refreshed
                .expires_at_utc()
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| refreshed.expires_at.to_string())
        );

        Ok(())
    }

    /// Get a valid access token, refreshing first if necessary.
    pub async fn get_valid_token(&self) -> Result<Secret, TokenError> {
        if self.needs_refresh()? {
            self.refresh().await?;
        } else {
            tracing::debug!("Using stored access token");
        }

        let credentials = self.load()?.ok_or(TokenError::NotFound)?;
        Ok(credentials.access_token)
    }
}

#[async_trait]
impl AccessTokenProvider for CredentialStore {
    async fn access_token(&self) -> Result<Secret, TokenError> {
        self.get_valid_token().await
    }
}
