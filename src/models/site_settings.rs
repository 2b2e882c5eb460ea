use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Contents of the single `site_settings` row that drives the about page.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Validate)]
pub struct SiteSettings {
    #[serde(default)]
    #[validate(nested)]
    pub profile: Profile,
    #[serde(default)]
    pub schedule: Vec<ScheduleEntry>,
    #[serde(default)]
    pub favorite_games: Vec<FavoriteGame>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Validate)]
pub struct Profile {
    #[validate(length(max = 100))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub bio: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ScheduleEntry {
    pub day: String,
    pub title: String,
    pub start: String,
    pub end: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct FavoriteGame {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiteSettingsRecord {
    pub id: Uuid,
    pub settings: SiteSettings,
    pub updated_at: DateTime<Utc>,
}
