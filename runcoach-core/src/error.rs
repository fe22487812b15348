//! Top-level error type for runcoach.

use thiserror::Error;

use crate::config::ConfigError;
use crate::store::StoreError;
use crate::token::TokenError;

/// Top-level error type encompassing all runcoach credential errors.
#[derive(Debug, Error)]
pub enum CoachError {
    /// Missing or invalid configuration; fatal to store construction.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error from credential storage operations.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Error from token operations.
    #[error("token error: {0}")]
    Token(#[from] TokenError),
}
