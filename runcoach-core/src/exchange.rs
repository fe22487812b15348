//! Refresh-token exchange against the provider's OAuth endpoint.
//!
//! Strava answers refreshes with an absolute `expires_at` rather than the
//! standard `expires_in`, so the request is issued directly with `reqwest`
//! and the response decoded into [`Credentials`].

use std::time::Duration;

use serde::Deserialize;

use crate::config::ClientCredentials;
use crate::model::Credentials;
use crate::secret::Secret;
use crate::token::TokenError;

/// Successful token endpoint response.
///
/// Extra fields (`token_type`, `expires_in`, `athlete`) are ignored.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Secret,
    refresh_token: Secret,
    expires_at: i64,
}

impl From<TokenResponse> for Credentials {
    fn from(response: TokenResponse) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: response.expires_at,
        }
    }
}

/// HTTP client for the token endpoint.
#[derive(Debug, Clone)]
pub struct TokenExchange {
    http_client: reqwest::Client,
    token_url: String,
}

impl TokenExchange {
    /// Create an exchange client for `token_url` with a per-request timeout.
    pub fn new(token_url: impl Into<String>, timeout: Duration) -> Result<Self, TokenError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TokenError::Network {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            token_url: token_url.into(),
        })
    }

    /// The endpoint this client posts to.
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Exchange a refresh token for a new token pair.
    ///
    /// Issues exactly one request; no retry is attempted.
    pub async fn refresh(
        &self,
        client: &ClientCredentials,
        refresh_token: &Secret,
    ) -> Result<Credentials, TokenError> {
        let form = [
            ("client_id", client.client_id()),
            ("client_secret", client.client_secret().expose()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.expose()),
        ];

        tracing::debug!("Requesting token refresh from {}", self.token_url);

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| TokenError::Network {
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| TokenError::Network {
            message: format!("failed to read response body: {}", e),
        })?;

        if status != reqwest::StatusCode::OK {
            return Err(TokenError::RefreshFailed {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| TokenError::InvalidResponse {
                message: e.to_string(),
            })?;

        Ok(parsed.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_string_contains, method, path},
    };

    fn client() -> ClientCredentials {
        ClientCredentials::new("12345", "shh").unwrap()
    }

    #[tokio::test]
    async fn test_refresh_sends_form_fields() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("client_id=12345"))
            .and(body_string_contains("client_secret=shh"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=old-refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token_type": "Bearer",
                "access_token": "new-access",
                "refresh_token": "new-refresh",
                "expires_at": 1_900_000_000,
                "expires_in": 21600
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let exchange = TokenExchange::new(
            format!("{}/oauth/token", mock_server.uri()),
            Duration::from_secs(5),
        )
        .unwrap();

        let creds = exchange
            .refresh(&client(), &Secret::new("old-refresh"))
            .await
            .unwrap();

        assert_eq!(creds, Credentials::new("new-access", "new-refresh", 1_900_000_000));
    }

    #[tokio::test]
    async fn test_refresh_non_success_embeds_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Bad Request: invalid refresh_token"))
            .mount(&mock_server)
            .await;

        let exchange = TokenExchange::new(mock_server.uri(), Duration::from_secs(5)).unwrap();
        let err = exchange
            .refresh(&client(), &Secret::new("stale"))
            .await
            .unwrap_err();

        match err {
            TokenError::RefreshFailed { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("invalid refresh_token"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_refresh_malformed_success_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "only-half"
            })))
            .mount(&mock_server)
            .await;

        let exchange = TokenExchange::new(mock_server.uri(), Duration::from_secs(5)).unwrap();
        let err = exchange
            .refresh(&client(), &Secret::new("r"))
            .await
            .unwrap_err();

        assert!(matches!(err, TokenError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_refresh_timeout_is_network_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&mock_server)
            .await;

        let exchange = TokenExchange::new(mock_server.uri(), Duration::from_millis(100)).unwrap();
        let err = exchange
            .refresh(&client(), &Secret::new("r"))
            .await
            .unwrap_err();

        assert!(matches!(err, TokenError::Network { .. }));
    }
}
