use crate::config::DatabaseConfig;
use rocket::fairing::AdHoc;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

/// Builds the pool without opening a connection; the first query connects.
pub fn init_pool(db_config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(db_config.max_connections)
        .min_connections(db_config.min_connections)
        .acquire_timeout(Duration::from_secs(db_config.acquire_timeout))
        .idle_timeout(Duration::from_secs(30))
        .max_lifetime(Duration::from_secs(1800))
        .connect_lazy(&db_config.url)
}

/// Reports database reachability once the server is up. Never aborts launch.
pub fn stage_db(pool: PgPool) -> AdHoc {
    AdHoc::on_liftoff("Postgres (sqlx)", move |_| {
        Box::pin(async move {
            match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&pool).await {
                Ok(_) => tracing::info!("Database connection verified"),
                Err(e) => tracing::error!("Database is not reachable yet: {}", e),
            }
        })
    })
}
