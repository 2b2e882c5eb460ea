use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::user_role::UserRole;
use uuid::Uuid;

#[async_trait::async_trait]
pub trait UserRoleRepository {
    async fn get_user_role(&self, user_id: &Uuid) -> Result<Option<UserRole>, AppError>;
}

#[async_trait::async_trait]
impl UserRoleRepository for PostgresRepository {
    async fn get_user_role(&self, user_id: &Uuid) -> Result<Option<UserRole>, AppError> {
        let role: Option<String> = sqlx::query_scalar("SELECT role::text FROM user_roles WHERE user_id = $1 LIMIT 1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(role.as_deref().and_then(UserRole::from_db))
    }
}
