use chrono::{DateTime, Utc};
use regex::Regex;
use rocket::serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use uuid::Uuid;
use validator::Validate;

/// Number of characters kept from the stripped body when deriving an excerpt.
pub const EXCERPT_CHARS: usize = 100;

static MARKDOWN_MARKERS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[#*`]").expect("valid markdown marker pattern"));

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    Published,
    #[default]
    Draft,
}

impl ArticleStatus {
    pub fn as_db(&self) -> &'static str {
        match self {
            ArticleStatus::Published => "published",
            ArticleStatus::Draft => "draft",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "published" => ArticleStatus::Published,
            _ => ArticleStatus::Draft,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub category: Option<String>,
    pub thumbnail: Option<String>,
    pub status: ArticleStatus,
    pub author_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// How a list of articles is ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleOrder {
    NewestFirst,
    RecentlyUpdated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleFilter {
    pub category: Option<String>,
    pub limit: Option<i64>,
    pub order: ArticleOrder,
}

impl ArticleFilter {
    pub fn latest(limit: i64) -> Self {
        Self {
            category: None,
            limit: Some(limit),
            order: ArticleOrder::NewestFirst,
        }
    }

    pub fn by_category(category: Option<String>) -> Self {
        Self {
            category,
            limit: None,
            order: ArticleOrder::RecentlyUpdated,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Validate)]
pub struct ArticleRequest {
    /// Present when editing an existing article.
    pub id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1))]
    pub content: String,
    #[serde(default)]
    pub status: ArticleStatus,
    pub category: Option<String>,
    pub thumbnail: Option<String>,
}

impl ArticleRequest {
    pub fn excerpt(&self) -> String {
        derive_excerpt(&self.content)
    }

    // The editor sends "" for "no category"; the column stores NULL instead.
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }

    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

/// Strips markdown markers and keeps the first [`EXCERPT_CHARS`] characters.
pub fn derive_excerpt(content: &str) -> String {
    let stripped = MARKDOWN_MARKERS.replace_all(content, "");
    let mut excerpt: String = stripped.chars().take(EXCERPT_CHARS).collect();
    excerpt.push_str("...");
    excerpt
}

/// Listing view of an article, without the body.
#[derive(Serialize, Debug, Clone)]
pub struct ArticleCard {
    pub id: Uuid,
    pub title: String,
    pub excerpt: String,
    pub category: Option<String>,
    pub thumbnail: Option<String>,
    pub status: ArticleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Article> for ArticleCard {
    fn from(article: &Article) -> Self {
        Self {
            id: article.id,
            title: article.title.clone(),
            excerpt: article.excerpt.clone(),
            category: article.category.clone(),
            thumbnail: article.thumbnail.clone(),
            status: article.status,
            created_at: article.created_at,
            updated_at: article.updated_at,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct ArticleResponse {
    pub id: Uuid,
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub category: Option<String>,
    pub thumbnail: Option<String>,
    pub status: ArticleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Article> for ArticleResponse {
    fn from(article: &Article) -> Self {
        Self {
            id: article.id,
            title: article.title.clone(),
            excerpt: article.excerpt.clone(),
            content: article.content.clone(),
            category: article.category.clone(),
            thumbnail: article.thumbnail.clone(),
            status: article.status,
            created_at: article.created_at,
            updated_at: article.updated_at,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArticleStats {
    pub total: usize,
    pub published: usize,
    pub draft: usize,
}

impl ArticleStats {
    pub fn from_articles(articles: &[Article]) -> Self {
        let published = articles.iter().filter(|a| a.status == ArticleStatus::Published).count();
        Self {
            total: articles.len(),
            published,
            draft: articles.len() - published,
        }
    }
}
