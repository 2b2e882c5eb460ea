//! Live-status resolution for a Twitch channel.
//!
//! Resolution runs four dependent stages against the Helix API:
//!
//! ```text
//! app token -> user id -> active stream -> (offline only) latest archive
//! ```
//!
//! Each stage is a method on [`TwitchApi`] so the pipeline in
//! [`LiveStatusResolver`] can be driven by a scripted implementation in tests.
//! Nothing is cached and nothing is retried: every resolution fetches a fresh
//! token and any stage failure ends the resolution.

use crate::config::TwitchConfig;
use crate::models::channel::ChannelStatus;
use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;

static CHANNEL_LOGIN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{1,25}$").expect("valid channel login pattern"));

/// Twitch login names are 1-25 ASCII letters, digits or underscores.
pub fn is_valid_channel_login(login: &str) -> bool {
    CHANNEL_LOGIN.is_match(login)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Token,
    UserLookup,
    LiveStream,
    Archive,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Token => "token exchange",
            Stage::UserLookup => "user lookup",
            Stage::LiveStream => "live stream lookup",
            Stage::Archive => "archive lookup",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum TwitchError {
    #[error("twitch client credentials are not configured")]
    MissingCredentials,
    #[error("token exchange rejected with status {status}: {detail}")]
    TokenRejected { status: u16, detail: String },
    #[error("{stage} failed with status {status}")]
    Status { stage: Stage, status: u16 },
    #[error("{stage} failed: {source}")]
    Transport {
        stage: Stage,
        #[source]
        source: reqwest::Error,
    },
}

impl TwitchError {
    /// Credential problems, as opposed to the platform being unavailable.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, TwitchError::MissingCredentials | TwitchError::TokenRejected { .. })
    }

    pub fn stage(&self) -> Stage {
        match self {
            TwitchError::MissingCredentials | TwitchError::TokenRejected { .. } => Stage::Token,
            TwitchError::Status { stage, .. } | TwitchError::Transport { stage, .. } => *stage,
        }
    }
}

/// App access token from the client-credentials flow. Lives for one resolution.
#[derive(Clone, PartialEq, Eq)]
pub struct AppToken(String);

impl AppToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AppToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AppToken([redacted])")
    }
}

#[async_trait::async_trait]
pub trait TwitchApi: Send + Sync {
    async fn app_token(&self) -> Result<AppToken, TwitchError>;
    async fn find_user_id(&self, token: &AppToken, login: &str) -> Result<Option<String>, TwitchError>;
    async fn active_stream(&self, token: &AppToken, user_id: &str) -> Result<Option<Value>, TwitchError>;
    async fn latest_archive(&self, token: &AppToken, user_id: &str) -> Result<Option<String>, TwitchError>;
}

pub struct LiveStatusResolver<'a> {
    api: &'a dyn TwitchApi,
}

impl<'a> LiveStatusResolver<'a> {
    pub fn new(api: &'a dyn TwitchApi) -> Self {
        Self { api }
    }

    pub async fn resolve(&self, channel: &str) -> Result<ChannelStatus, TwitchError> {
        let token = self.api.app_token().await?;

        let Some(user_id) = self.api.find_user_id(&token, channel).await? else {
            debug!(channel = %channel, "no platform user for channel");
            return Ok(ChannelStatus::offline(None));
        };

        if let Some(stream) = self.api.active_stream(&token, &user_id).await? {
            debug!(channel = %channel, user_id = %user_id, "channel is live");
            return Ok(ChannelStatus::live(stream));
        }

        let last_video_id = self.api.latest_archive(&token, &user_id).await?;
        debug!(channel = %channel, user_id = %user_id, archive = ?last_video_id, "channel is offline");
        Ok(ChannelStatus::offline(last_video_id))
    }
}

#[derive(Debug, Clone)]
struct ClientCredentials {
    client_id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Helix list envelope: `{ "data": [...] }`.
#[derive(Debug, Deserialize)]
struct HelixPage<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct HelixUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct HelixVideo {
    id: String,
}

/// [`TwitchApi`] over HTTPS.
///
/// Missing credentials are reported by the token stage, at request time, so
/// the server starts without them.
pub struct HelixClient {
    credentials: Option<ClientCredentials>,
    token_url: String,
    api_base_url: String,
    http: reqwest::Client,
}

impl HelixClient {
    pub fn new(config: &TwitchConfig, http: reqwest::Client) -> Self {
        let credentials = match (config.client_id.as_deref(), config.client_secret.as_deref()) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Some(ClientCredentials {
                client_id: id.to_string(),
                client_secret: secret.to_string(),
            }),
            _ => None,
        };

        Self {
            credentials,
            token_url: config.token_url.clone(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    fn credentials(&self) -> Result<&ClientCredentials, TwitchError> {
        self.credentials.as_ref().ok_or(TwitchError::MissingCredentials)
    }

    async fn helix_get<T: DeserializeOwned>(&self, stage: Stage, token: &AppToken, path: &str, query: &[(&str, &str)]) -> Result<HelixPage<T>, TwitchError> {
        let credentials = self.credentials()?;
        let transport = |source| TwitchError::Transport { stage, source };

        let response = self
            .http
            .get(format!("{}/{}", self.api_base_url, path))
            .query(query)
            .header("Client-Id", &credentials.client_id)
            .bearer_auth(token.secret())
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(TwitchError::Status {
                stage,
                status: response.status().as_u16(),
            });
        }

        response.json::<HelixPage<T>>().await.map_err(transport)
    }
}

#[async_trait::async_trait]
impl TwitchApi for HelixClient {
    async fn app_token(&self) -> Result<AppToken, TwitchError> {
        let credentials = self.credentials()?;
        let transport = |source| TwitchError::Transport { stage: Stage::Token, source };

        let params = [
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("grant_type", "client_credentials"),
        ];

        let response = self.http.post(&self.token_url).form(&params).send().await.map_err(transport)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let detail = response.text().await.unwrap_or_default();
            return Err(TwitchError::TokenRejected { status, detail });
        }

        let token = response.json::<TokenResponse>().await.map_err(transport)?;
        Ok(AppToken::new(token.access_token))
    }

    async fn find_user_id(&self, token: &AppToken, login: &str) -> Result<Option<String>, TwitchError> {
        let page: HelixPage<HelixUser> = self.helix_get(Stage::UserLookup, token, "users", &[("login", login)]).await?;
        Ok(page.data.into_iter().next().map(|user| user.id))
    }

    async fn active_stream(&self, token: &AppToken, user_id: &str) -> Result<Option<Value>, TwitchError> {
        let page: HelixPage<Value> = self.helix_get(Stage::LiveStream, token, "streams", &[("user_id", user_id)]).await?;
        Ok(page.data.into_iter().next())
    }

    async fn latest_archive(&self, token: &AppToken, user_id: &str) -> Result<Option<String>, TwitchError> {
        let page: HelixPage<HelixVideo> = self
            .helix_get(Stage::Archive, token, "videos", &[("user_id", user_id), ("type", "archive"), ("first", "1")])
            .await?;
        Ok(page.data.into_iter().next().map(|video| video.id))
    }
}
