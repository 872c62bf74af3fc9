use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Profile details returned by the identity provider after sign-in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// An OAuth access/refresh token pair with its absolute expiry instant.
///
/// Expiry is stored as a UTC timestamp rather than a relative lifetime so
/// that a token loaded from disk after a restart still knows when it dies.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
}

impl AccessToken {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_in_secs: i64,
    ) -> Self {
        AccessToken {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at: Utc::now() + Duration::seconds(expires_in_secs),
            user: None,
        }
    }

    pub fn with_user(mut self, user: Option<UserInfo>) -> Self {
        self.user = user;
        self
    }

    /// True once the expiry instant has passed.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// True when the token expires within the given margin. Used by the
    /// background watchdog to refresh ahead of the actual deadline.
    pub fn expires_within(&self, margin: Duration) -> bool {
        Utc::now() + margin >= self.expires_at
    }
}
