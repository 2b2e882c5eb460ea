use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::category::Category;

#[async_trait::async_trait]
pub trait CategoryRepository {
    async fn list_categories(&self) -> Result<Vec<Category>, AppError>;
}

#[async_trait::async_trait]
impl CategoryRepository for PostgresRepository {
    async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        let categories = sqlx::query_as::<_, Category>("SELECT id, name, slug, created_at FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(categories)
    }
}
