use crate::database::article::ArticleRepository;
use crate::database::category::CategoryRepository;
use crate::database::settings::SettingsRepository;
use crate::database::user_role::UserRoleRepository;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct PostgresRepository {
    pub pool: PgPool,
}

/// Everything the routes read from or write to the content tables.
pub trait ContentRepository: ArticleRepository + CategoryRepository + SettingsRepository + UserRoleRepository + Send + Sync {}

impl<T> ContentRepository for T where T: ArticleRepository + CategoryRepository + SettingsRepository + UserRoleRepository + Send + Sync {}

pub type SharedRepository = Arc<dyn ContentRepository>;
