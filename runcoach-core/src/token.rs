//! Token lifecycle errors and the provider trait.
//!
//! - [`TokenError`] - every way obtaining or refreshing a token can fail
//! - [`AccessTokenProvider`] - trait for handing out a currently valid token

use async_trait::async_trait;
use thiserror::Error;

use crate::secret::Secret;

/// Error type for token operations.
///
/// These are returned, never panicked; callers decide whether to retry,
/// re-authenticate or give up.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Client id or secret is not configured.
    #[error("client ID and secret not configured")]
    NotConfigured,

    /// No credential record is stored.
    #[error("no credentials found")]
    NotFound,

    /// The token endpoint answered with a non-success status.
    #[error("token refresh failed (HTTP {status}): {body}")]
    RefreshFailed { status: u16, body: String },

    /// The token endpoint could not be reached or timed out.
    #[error("network error: {message}")]
    Network { message: String },

    /// The token endpoint answered 200 with an unusable body.
    #[error("invalid token response: {message}")]
    InvalidResponse { message: String },

    /// Storage error during token operations.
    #[error("storage error: {0}")]
    Storage(#[from] crate::store::StoreError),
}

/// Trait for anything that can produce a valid access token.
///
/// Downstream API clients depend on this rather than on the concrete store.
///
/// # Example
///
/// ```rust,ignore
/// use runcoach_core::{AccessTokenProvider, TokenError};
///
/// async fn fetch_activities(tokens: &impl AccessTokenProvider) -> Result<(), TokenError> {
///     let token = tokens.access_token().await?;
///     // Send `Authorization: Bearer {token.expose()}`
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Get a valid access token, refreshing first if necessary.
    async fn access_token(&self) -> Result<Secret, TokenError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_failed_message_embeds_body() {
        let err = TokenError::RefreshFailed {
            status: 401,
            body: r#"{"message":"Authorization Error"}"#.to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("401"));
        assert!(message.contains("Authorization Error"));
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(TokenError::NotFound.to_string(), "no credentials found");
    }
}
