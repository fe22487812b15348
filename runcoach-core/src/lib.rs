//! # runcoach Core
//!
//! Credential management for the runcoach assistant.
//!
//! This crate provides:
//! - [`CredentialStore`] - encrypted on-disk storage of one Strava token pair
//! - [`TokenExchange`] - the refresh-token request against the OAuth endpoint
//! - Typed configuration ([`ClientCredentials`], [`EnvConfig`], [`StoreConfig`])
//! - [`AccessTokenProvider`] - trait for anything that hands out a valid token
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use runcoach_core::{ClientCredentials, CredentialStore, EnvConfig, StoreConfig};
//!
//! async fn token() -> Result<String, Box<dyn std::error::Error>> {
//!     let env = EnvConfig::load();
//!     let client = ClientCredentials::resolve(None, None, &env)?;
//!     let store = CredentialStore::open(StoreConfig::default(), client)?;
//!     let token = store.get_valid_token().await?;
//!     Ok(token.expose().to_string())
//! }
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod exchange;
pub mod model;
pub mod secret;
pub mod store;
pub mod token;

pub use config::{
    ClientCredentials,
    ConfigError,
    EnvConfig,
    StoreConfig,
    default_config_dir,
};

pub use crypto::EncryptionKey;

pub use error::CoachError;

pub use exchange::TokenExchange;

pub use model::{
    CredentialStatus,
    Credentials,
};

pub use secret::Secret;

pub use store::{
    CredentialStore,
    StoreError,
};

pub use token::{
    AccessTokenProvider,
    TokenError,
};
