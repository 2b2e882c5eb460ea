pub mod identity;
pub mod storage;
pub mod twitch;

use crate::config::{Config, HttpConfig};
use crate::database::postgres_repository::{PostgresRepository, SharedRepository};
use crate::service::identity::{GoTrueClient, IdentityProvider, SessionValidator};
use crate::service::storage::{BucketStorage, ObjectStorage};
use crate::service::twitch::{HelixClient, TwitchApi};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

/// Everything route handlers and guards reach for, managed as Rocket state.
#[derive(Clone)]
pub struct AppServices {
    pub repository: SharedRepository,
    pub session_validator: Arc<dyn SessionValidator>,
    pub identity: Arc<dyn IdentityProvider>,
    pub storage: Arc<dyn ObjectStorage>,
    pub twitch: Arc<dyn TwitchApi>,
}

impl AppServices {
    /// Production wiring: Postgres for content, the hosted backend for
    /// identity and storage, Helix for channel status.
    pub fn connect(config: &Config, pool: PgPool) -> Result<Self, reqwest::Error> {
        let http = build_http_client(&config.http)?;

        let gotrue = Arc::new(GoTrueClient::new(&config.backend, http.clone()));
        let twitch = HelixClient::new(&config.twitch, http.clone());
        if !twitch.has_credentials() {
            tracing::warn!("twitch client credentials are not configured; live status requests will fail");
        }

        Ok(Self {
            repository: Arc::new(PostgresRepository { pool }),
            session_validator: gotrue.clone(),
            identity: gotrue,
            storage: Arc::new(BucketStorage::new(&config.backend, &config.storage, http)),
            twitch: Arc::new(twitch),
        })
    }
}

pub fn build_http_client(config: &HttpConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs.max(1)))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs.max(1)))
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}
