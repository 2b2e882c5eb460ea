use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::site_settings::{SiteSettings, SiteSettingsRecord};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
struct SiteSettingsRow {
    id: Uuid,
    settings: Json<SiteSettings>,
    updated_at: DateTime<Utc>,
}

impl From<SiteSettingsRow> for SiteSettingsRecord {
    fn from(row: SiteSettingsRow) -> Self {
        SiteSettingsRecord {
            id: row.id,
            settings: row.settings.0,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait::async_trait]
pub trait SettingsRepository {
    async fn get_site_settings(&self) -> Result<Option<SiteSettingsRecord>, AppError>;
    async fn upsert_site_settings(&self, settings: &SiteSettings) -> Result<SiteSettingsRecord, AppError>;
}

#[async_trait::async_trait]
impl SettingsRepository for PostgresRepository {
    async fn get_site_settings(&self) -> Result<Option<SiteSettingsRecord>, AppError> {
        let row = sqlx::query_as::<_, SiteSettingsRow>(
            r#"
            SELECT id, settings, updated_at
            FROM site_settings
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SiteSettingsRecord::from))
    }

    async fn upsert_site_settings(&self, settings: &SiteSettings) -> Result<SiteSettingsRecord, AppError> {
        let mut transaction = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, SiteSettingsRow>(
            r#"
            UPDATE site_settings
            SET settings = $1, updated_at = now()
            WHERE id = (SELECT id FROM site_settings ORDER BY created_at LIMIT 1)
            RETURNING id, settings, updated_at
            "#,
        )
        .bind(Json(settings))
        .fetch_optional(&mut *transaction)
        .await?;

        let row = match updated {
            Some(row) => row,
            None => {
                sqlx::query_as::<_, SiteSettingsRow>(
                    r#"
                    INSERT INTO site_settings (settings)
                    VALUES ($1)
                    RETURNING id, settings, updated_at
                    "#,
                )
                .bind(Json(settings))
                .fetch_one(&mut *transaction)
                .await?
            }
        };

        transaction.commit().await?;

        Ok(SiteSettingsRecord::from(row))
    }
}
