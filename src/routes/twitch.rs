use crate::config::Config;
use crate::error::app_error::AppError;
use crate::middleware::rate_limit::RateLimit;
use crate::models::channel::{ChannelStatus, EmbedResponse};
use crate::service::AppServices;
use crate::service::twitch::{LiveStatusResolver, is_valid_channel_login};
use rocket::serde::json::Json;
use rocket::{State, get};
use rocket_okapi::openapi;
use tracing::warn;

const DEFAULT_EMBED_PARENT: &str = "localhost";

async fn resolve(services: &AppServices, channel: &str) -> Result<ChannelStatus, AppError> {
    let status = LiveStatusResolver::new(services.twitch.as_ref()).resolve(channel).await.inspect_err(|e| {
        warn!(
            channel = %channel,
            stage = %e.stage(),
            credentials = e.is_auth_error(),
            error = %e,
            "live status resolution failed"
        )
    })?;
    Ok(status)
}

fn require_channel(channel: Option<String>) -> Result<String, AppError> {
    let channel = channel.map(|c| c.trim().to_string()).unwrap_or_default();
    if channel.is_empty() {
        return Err(AppError::BadRequest("Channel is required".to_string()));
    }
    if !is_valid_channel_login(&channel) {
        return Err(AppError::BadRequest("Invalid channel name".to_string()));
    }
    Ok(channel)
}

/// Live status of a channel, with its latest archive while offline
#[openapi(tag = "Twitch")]
#[get("/?<channel>")]
pub async fn get_channel_status(services: &State<AppServices>, _rate_limit: RateLimit, channel: Option<String>) -> Result<Json<ChannelStatus>, AppError> {
    let channel = require_channel(channel)?;
    Ok(Json(resolve(services, &channel).await?))
}

/// Player URL for a channel: the live stream, or the latest archive while offline
#[openapi(tag = "Twitch")]
#[get("/embed?<channel>&<parent>")]
pub async fn get_channel_embed(
    services: &State<AppServices>,
    config: &State<Config>,
    _rate_limit: RateLimit,
    channel: Option<String>,
    parent: Option<String>,
) -> Result<Json<EmbedResponse>, AppError> {
    let channel = require_channel(channel)?;
    let parent = parent.filter(|p| !p.trim().is_empty()).unwrap_or_else(|| DEFAULT_EMBED_PARENT.to_string());

    let status = resolve(services, &channel).await?;
    Ok(Json(EmbedResponse::new(&channel, &status, &config.twitch.player_url, &parent)))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![get_channel_status, get_channel_embed]
}
