use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token pair issued by the identity provider, kept in the encrypted session cookie.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds) after which the access token is no longer accepted.
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl StoredSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now.timestamp() >= expires_at)
    }

    pub fn to_cookie_value(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_cookie_value(value: &str) -> Option<Self> {
        serde_json::from_str(value).ok()
    }
}

// Tokens stay out of logs.
impl std::fmt::Debug for StoredSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredSession")
            .field("access_token", &"[redacted]")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// Result of checking a stored session against the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionCheck {
    /// `None` when the provider rejected the session.
    pub user: Option<SessionUser>,
    /// Replacement tokens when the provider refreshed the session.
    pub refreshed: Option<StoredSession>,
}

impl SessionCheck {
    pub fn valid(user: SessionUser) -> Self {
        Self { user: Some(user), refreshed: None }
    }

    pub fn refreshed(user: SessionUser, session: StoredSession) -> Self {
        Self {
            user: Some(user),
            refreshed: Some(session),
        }
    }

    pub fn rejected() -> Self {
        Self::default()
    }
}
