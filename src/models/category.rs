use chrono::{DateTime, Utc};
use rocket::serde::Serialize;
use uuid::Uuid;

#[derive(Serialize, Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}
