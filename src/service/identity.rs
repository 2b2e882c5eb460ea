//! Session validation and password sign-in against the hosted identity
//! service (GoTrue REST API).
//!
//! The access gate only needs [`SessionValidator`]; the login routes use
//! [`IdentityProvider`]. [`GoTrueClient`] implements both.

use crate::config::BackendConfig;
use crate::models::session::{SessionCheck, SessionUser, StoredSession};
use chrono::Utc;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("identity provider returned {status} for {operation}: {detail}")]
    Status {
        operation: &'static str,
        status: u16,
        detail: String,
    },
    #[error("invalid email or password")]
    InvalidCredentials,
}

/// Checks a stored session against the identity provider.
///
/// `Ok` with `user: None` means the provider answered and rejected the
/// session. `Err` means the provider could not give an answer.
#[async_trait::async_trait]
pub trait SessionValidator: Send + Sync {
    async fn validate(&self, session: &StoredSession) -> Result<SessionCheck, IdentityError>;
}

#[derive(Debug, Clone)]
pub struct SignIn {
    pub user: SessionUser,
    pub session: StoredSession,
}

#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<SignIn, IdentityError>;
    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError>;
}

/// Session payload returned by the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: SessionUser,
}

impl TokenGrant {
    fn into_sign_in(self) -> SignIn {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| Utc::now().timestamp() + secs));
        SignIn {
            user: self.user,
            session: StoredSession {
                access_token: self.access_token,
                refresh_token: self.refresh_token,
                expires_at,
            },
        }
    }
}

pub struct GoTrueClient {
    base_url: String,
    anon_key: String,
    http: reqwest::Client,
}

impl GoTrueClient {
    pub fn new(config: &BackendConfig, http: reqwest::Client) -> Self {
        Self {
            base_url: format!("{}/auth/v1", config.url.trim_end_matches('/')),
            anon_key: config.anon_key.clone(),
            http,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// `Ok(None)` when the provider does not accept the access token.
    async fn fetch_user(&self, access_token: &str) -> Result<Option<SessionUser>, IdentityError> {
        let response = self
            .http
            .get(self.endpoint("user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(Some(response.json::<SessionUser>().await?)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            _ => Err(Self::status_error(response, "user lookup").await),
        }
    }

    /// `Ok(None)` when the refresh token was revoked or already used.
    async fn refresh(&self, refresh_token: &str) -> Result<Option<SignIn>, IdentityError> {
        let response = self
            .http
            .post(self.endpoint("token"))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(Some(response.json::<TokenGrant>().await?.into_sign_in())),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            _ => Err(Self::status_error(response, "session refresh").await),
        }
    }

    async fn status_error(response: reqwest::Response, operation: &'static str) -> IdentityError {
        let status = response.status().as_u16();
        let detail = response.text().await.unwrap_or_default();
        IdentityError::Status { operation, status, detail }
    }
}

#[async_trait::async_trait]
impl SessionValidator for GoTrueClient {
    async fn validate(&self, session: &StoredSession) -> Result<SessionCheck, IdentityError> {
        if !session.is_expired(Utc::now())
            && let Some(user) = self.fetch_user(&session.access_token).await?
        {
            return Ok(SessionCheck::valid(user));
        }

        let Some(refresh_token) = session.refresh_token.as_deref() else {
            return Ok(SessionCheck::rejected());
        };

        debug!("access token expired or rejected, refreshing session");
        match self.refresh(refresh_token).await? {
            Some(fresh) => Ok(SessionCheck::refreshed(fresh.user, fresh.session)),
            None => Ok(SessionCheck::rejected()),
        }
    }
}

#[async_trait::async_trait]
impl IdentityProvider for GoTrueClient {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<SignIn, IdentityError> {
        let response = self
            .http
            .post(self.endpoint("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.json::<TokenGrant>().await?.into_sign_in()),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => Err(IdentityError::InvalidCredentials),
            _ => Err(Self::status_error(response, "password sign-in").await),
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        let response = self
            .http
            .post(self.endpoint("logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        // An already invalid token means there is nothing left to revoke.
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Ok(()),
            _ => Err(Self::status_error(response, "sign-out").await),
        }
    }
}
