use rocket::serde::Serialize;
use schemars::JsonSchema;
use serde_json::Value;

/// Live or offline state of a streaming channel.
///
/// Built only through [`ChannelStatus::live`] and [`ChannelStatus::offline`],
/// so `stream_info` is set only while live and `last_video_id` only while offline.
#[derive(Serialize, Debug, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatus {
    is_live: bool,
    stream_info: Option<Value>,
    last_video_id: Option<String>,
}

impl ChannelStatus {
    pub fn live(stream_info: Value) -> Self {
        Self {
            is_live: true,
            stream_info: Some(stream_info),
            last_video_id: None,
        }
    }

    pub fn offline(last_video_id: Option<String>) -> Self {
        Self {
            is_live: false,
            stream_info: None,
            last_video_id,
        }
    }

    pub fn is_live(&self) -> bool {
        self.is_live
    }

    pub fn stream_info(&self) -> Option<&Value> {
        self.stream_info.as_ref()
    }

    pub fn last_video_id(&self) -> Option<&str> {
        self.last_video_id.as_deref()
    }
}

/// What the embedded player should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbedTarget {
    Channel(String),
    Video(String),
}

impl EmbedTarget {
    /// Live channels play live; offline channels play their latest archive,
    /// falling back to the channel page when there is none.
    pub fn from_status(channel: &str, status: &ChannelStatus) -> Self {
        match (status.is_live(), status.last_video_id()) {
            (false, Some(video_id)) => EmbedTarget::Video(video_id.to_string()),
            _ => EmbedTarget::Channel(channel.to_string()),
        }
    }

    pub fn player_url(&self, player_base: &str, parent: &str) -> String {
        let (key, value) = match self {
            EmbedTarget::Channel(channel) => ("channel", channel),
            EmbedTarget::Video(video_id) => ("video", video_id),
        };
        format!(
            "{}?parent={}&autoplay=true&muted=true&{}={}",
            player_base,
            urlencoding::encode(parent),
            key,
            urlencoding::encode(value)
        )
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EmbedBadge {
    Live,
    Archive,
}

#[derive(Serialize, Debug, Clone, JsonSchema)]
pub struct EmbedResponse {
    pub url: String,
    pub badge: EmbedBadge,
}

impl EmbedResponse {
    pub fn new(channel: &str, status: &ChannelStatus, player_base: &str, parent: &str) -> Self {
        let target = EmbedTarget::from_status(channel, status);
        Self {
            url: target.player_url(player_base, parent),
            badge: if status.is_live() { EmbedBadge::Live } else { EmbedBadge::Archive },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PLAYER: &str = "https://player.twitch.tv/";

    #[test]
    fn live_status_serializes_without_archive() {
        let status = ChannelStatus::live(json!({"id": "1", "title": "雑談"}));
        let body = serde_json::to_value(&status).expect("serializable");
        assert_eq!(body["isLive"], json!(true));
        assert_eq!(body["streamInfo"]["title"], json!("雑談"));
        assert_eq!(body["lastVideoId"], Value::Null);
    }

    #[test]
    fn offline_status_serializes_without_stream_info() {
        let body = serde_json::to_value(ChannelStatus::offline(Some("v42".to_string()))).expect("serializable");
        assert_eq!(body, json!({"isLive": false, "streamInfo": null, "lastVideoId": "v42"}));
    }

    #[test]
    fn live_channel_embeds_channel() {
        let status = ChannelStatus::live(json!({}));
        assert_eq!(EmbedTarget::from_status("gennosuke", &status), EmbedTarget::Channel("gennosuke".to_string()));
    }

    #[test]
    fn offline_channel_with_archive_embeds_video() {
        let status = ChannelStatus::offline(Some("2000".to_string()));
        assert_eq!(EmbedTarget::from_status("gennosuke", &status), EmbedTarget::Video("2000".to_string()));
    }

    #[test]
    fn offline_channel_without_archive_falls_back_to_channel() {
        let status = ChannelStatus::offline(None);
        assert_eq!(EmbedTarget::from_status("gennosuke", &status), EmbedTarget::Channel("gennosuke".to_string()));
    }

    #[test]
    fn player_url_carries_parent_and_autoplay() {
        let url = EmbedTarget::Video("2000".to_string()).player_url(PLAYER, "example.com");
        assert_eq!(url, "https://player.twitch.tv/?parent=example.com&autoplay=true&muted=true&video=2000");
    }

    #[test]
    fn offline_embed_uses_archive_badge() {
        let response = EmbedResponse::new("gennosuke", &ChannelStatus::offline(None), PLAYER, "localhost");
        assert_eq!(response.badge, EmbedBadge::Archive);
        assert!(response.url.ends_with("channel=gennosuke"));
    }
}
