use crate::models::article::{ArticleCard, ArticleStats};
use crate::models::category::Category;
use crate::models::site_settings::{Profile, SiteSettings};
use rocket::serde::Serialize;

/// Category label the article list treats as "no filter".
pub const ALL_CATEGORIES: &str = "すべて";

#[derive(Serialize, Debug)]
pub struct LandingPage {
    pub channel: String,
    pub profile: Option<Profile>,
    pub latest_articles: Vec<ArticleCard>,
}

#[derive(Serialize, Debug)]
pub struct ArticleListPage {
    pub selected_category: String,
    pub categories: Vec<Category>,
    pub articles: Vec<ArticleCard>,
}

#[derive(Serialize, Debug)]
pub struct AboutPage {
    pub settings: SiteSettings,
}

#[derive(Serialize, Debug)]
pub struct LoginPage {
    pub authenticated: bool,
    pub action: String,
}

#[derive(Serialize, Debug)]
pub struct DashboardPage {
    pub email: Option<String>,
    pub stats: ArticleStats,
    pub articles: Vec<ArticleCard>,
}

#[derive(Serialize, Debug)]
pub struct UploadResponse {
    pub public_url: String,
}

/// Maps the `category` query parameter to a filter value.
pub fn category_filter(selected: Option<&str>) -> Option<String> {
    selected
        .map(str::trim)
        .filter(|c| !c.is_empty() && *c != ALL_CATEGORIES)
        .map(str::to_string)
}
