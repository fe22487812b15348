//! Domain model types for runcoach credentials.
//!
//! - [`Credentials`] - the persisted Strava token pair and its expiry
//! - [`CredentialStatus`] - a read-only view of where a store sits in its lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::secret::Secret;

/// An OAuth token pair for the Strava API.
///
/// Serializes to a JSON object with exactly the keys `access_token`,
/// `refresh_token` and `expires_at`. All three are required when decoding,
/// so a record is either whole or rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Short-lived bearer token used for API calls.
    pub access_token: Secret,

    /// Long-lived token exchanged for a new pair once the access token expires.
    pub refresh_token: Secret,

    /// Absolute expiry of the access token, in epoch seconds.
    pub expires_at: i64,
}

impl Credentials {
    /// Create a new credential record.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: i64,
    ) -> Self {
        Self {
            access_token: Secret::new(access_token),
            refresh_token: Secret::new(refresh_token),
            expires_at,
        }
    }

    /// Check whether the access token expires at or before `now + buffer_secs`.
    pub fn expires_within(&self, buffer_secs: i64, now: i64) -> bool {
        self.expires_at <= now.saturating_add(buffer_secs)
    }

    /// The expiry as a UTC timestamp, if it is representable.
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.expires_at, 0)
    }
}

/// Lifecycle state of a credential store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CredentialStatus {
    /// Nothing has been saved yet.
    Missing,

    /// A record exists and its access token is outside the refresh window.
    Valid { expires_at: i64 },

    /// A record exists but the access token is expired or about to be.
    Stale { expires_at: i64 },
}

impl CredentialStatus {
    /// Whether a refresh is required before the token can be used.
    pub fn needs_refresh(&self) -> bool {
        !matches!(self, CredentialStatus::Valid { .. })
    }
}

impl fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let describe = |expires_at: i64| {
            DateTime::from_timestamp(expires_at, 0)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| expires_at.to_string())
        };
        match self {
            CredentialStatus::Missing => write!(f, "missing"),
            CredentialStatus::Valid { expires_at } => {
                write!(f, "valid (expires {})", describe(*expires_at))
            }
            CredentialStatus::Stale { expires_at } => {
                write!(f, "stale (expired or expiring {})", describe(*expires_at))
            }
        }
    }
}
