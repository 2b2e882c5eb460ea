//! Public site data: landing page, article list and detail, about page.

use crate::config::Config;
use crate::error::app_error::AppError;
use crate::middleware::rate_limit::RateLimit;
use crate::models::article::{ArticleCard, ArticleFilter, ArticleResponse};
use crate::models::pages::{ALL_CATEGORIES, AboutPage, ArticleListPage, LandingPage, category_filter};
use crate::service::AppServices;
use rocket::serde::json::Json;
use rocket::{State, get, routes};
use uuid::Uuid;

const LANDING_ARTICLES: i64 = 3;

#[get("/")]
pub async fn landing(services: &State<AppServices>, config: &State<Config>, _rate_limit: RateLimit) -> Result<Json<LandingPage>, AppError> {
    let repo = &services.repository;
    let articles = repo.list_published_articles(&ArticleFilter::latest(LANDING_ARTICLES)).await?;
    let settings = repo.get_site_settings().await?;

    Ok(Json(LandingPage {
        channel: config.twitch.channel.clone(),
        profile: settings.map(|record| record.settings.profile),
        latest_articles: articles.iter().map(ArticleCard::from).collect(),
    }))
}

#[get("/articles?<category>")]
pub async fn list_articles(services: &State<AppServices>, _rate_limit: RateLimit, category: Option<String>) -> Result<Json<ArticleListPage>, AppError> {
    let filter = category_filter(category.as_deref());
    let repo = &services.repository;

    let categories = repo.list_categories().await?;
    let articles = repo.list_published_articles(&ArticleFilter::by_category(filter.clone())).await?;

    Ok(Json(ArticleListPage {
        selected_category: filter.unwrap_or_else(|| ALL_CATEGORIES.to_string()),
        categories,
        articles: articles.iter().map(ArticleCard::from).collect(),
    }))
}

/// Drafts and malformed ids are indistinguishable from missing articles.
#[get("/articles/<id>")]
pub async fn get_article(services: &State<AppServices>, _rate_limit: RateLimit, id: &str) -> Result<Json<ArticleResponse>, AppError> {
    let not_found = || AppError::NotFound("Article not found".to_string());
    let article_id = Uuid::parse_str(id).map_err(|_| not_found())?;

    match services.repository.get_published_article(&article_id).await? {
        Some(article) => Ok(Json(ArticleResponse::from(&article))),
        None => Err(not_found()),
    }
}

#[get("/about")]
pub async fn about(services: &State<AppServices>, _rate_limit: RateLimit) -> Result<Json<AboutPage>, AppError> {
    let settings = services.repository.get_site_settings().await?.map(|record| record.settings).unwrap_or_default();
    Ok(Json(AboutPage { settings }))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![landing, list_articles, get_article, about]
}
