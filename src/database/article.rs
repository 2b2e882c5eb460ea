use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::article::{Article, ArticleFilter, ArticleOrder, ArticleRequest, ArticleStatus};
use chrono::{DateTime, Utc};
use uuid::Uuid;

const ARTICLE_COLUMNS: &str = "id, title, excerpt, content, category, thumbnail, status::text AS status, author_id, created_at, updated_at";

// Intermediate struct for sqlx query results with status as text
#[derive(Debug, sqlx::FromRow)]
struct ArticleRow {
    id: Uuid,
    title: String,
    excerpt: String,
    content: String,
    category: Option<String>,
    thumbnail: Option<String>,
    status: String,
    author_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Article {
            id: row.id,
            title: row.title,
            excerpt: row.excerpt,
            content: row.content,
            category: row.category,
            thumbnail: row.thumbnail,
            status: ArticleStatus::from_db(&row.status),
            author_id: row.author_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn order_clause(order: ArticleOrder) -> &'static str {
    match order {
        ArticleOrder::NewestFirst => "ORDER BY created_at DESC",
        ArticleOrder::RecentlyUpdated => "ORDER BY updated_at DESC",
    }
}

#[async_trait::async_trait]
pub trait ArticleRepository {
    async fn list_published_articles(&self, filter: &ArticleFilter) -> Result<Vec<Article>, AppError>;
    async fn get_published_article(&self, id: &Uuid) -> Result<Option<Article>, AppError>;
    async fn list_all_articles(&self) -> Result<Vec<Article>, AppError>;
    async fn get_article(&self, id: &Uuid) -> Result<Option<Article>, AppError>;
    async fn upsert_article(&self, request: &ArticleRequest, author_id: &Uuid) -> Result<Article, AppError>;
    async fn delete_article(&self, id: &Uuid) -> Result<(), AppError>;
}

#[async_trait::async_trait]
impl ArticleRepository for PostgresRepository {
    async fn list_published_articles(&self, filter: &ArticleFilter) -> Result<Vec<Article>, AppError> {
        // LIMIT NULL means no limit in Postgres
        let query = format!(
            "SELECT {} FROM articles WHERE status = 'published' AND ($1::text IS NULL OR category = $1) {} LIMIT $2",
            ARTICLE_COLUMNS,
            order_clause(filter.order)
        );

        let rows = sqlx::query_as::<_, ArticleRow>(&query)
            .bind(filter.category.as_deref())
            .bind(filter.limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Article::from).collect())
    }

    async fn get_published_article(&self, id: &Uuid) -> Result<Option<Article>, AppError> {
        let query = format!("SELECT {} FROM articles WHERE id = $1 AND status = 'published'", ARTICLE_COLUMNS);
        let row = sqlx::query_as::<_, ArticleRow>(&query).bind(id).fetch_optional(&self.pool).await?;

        Ok(row.map(Article::from))
    }

    async fn list_all_articles(&self) -> Result<Vec<Article>, AppError> {
        let query = format!("SELECT {} FROM articles ORDER BY updated_at DESC", ARTICLE_COLUMNS);
        let rows = sqlx::query_as::<_, ArticleRow>(&query).fetch_all(&self.pool).await?;

        Ok(rows.into_iter().map(Article::from).collect())
    }

    async fn get_article(&self, id: &Uuid) -> Result<Option<Article>, AppError> {
        let query = format!("SELECT {} FROM articles WHERE id = $1", ARTICLE_COLUMNS);
        let row = sqlx::query_as::<_, ArticleRow>(&query).bind(id).fetch_optional(&self.pool).await?;

        Ok(row.map(Article::from))
    }

    async fn upsert_article(&self, request: &ArticleRequest, author_id: &Uuid) -> Result<Article, AppError> {
        // author_id is only written on insert; editing keeps the original author
        let query = format!(
            r#"
            INSERT INTO articles (id, title, content, excerpt, thumbnail, status, category, author_id, updated_at)
            VALUES (COALESCE($1, gen_random_uuid()), $2, $3, $4, $5, $6, $7, $8, now())
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                content = EXCLUDED.content,
                excerpt = EXCLUDED.excerpt,
                thumbnail = EXCLUDED.thumbnail,
                status = EXCLUDED.status,
                category = EXCLUDED.category,
                updated_at = now()
            RETURNING {}
            "#,
            ARTICLE_COLUMNS
        );

        let row = sqlx::query_as::<_, ArticleRow>(&query)
            .bind(request.id)
            .bind(&request.title)
            .bind(&request.content)
            .bind(request.excerpt())
            .bind(request.thumbnail())
            .bind(request.status.as_db())
            .bind(request.category())
            .bind(author_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(Article::from(row))
    }

    async fn delete_article(&self, id: &Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM articles WHERE id = $1").bind(id).execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Article not found".to_string()));
        }

        Ok(())
    }
}
