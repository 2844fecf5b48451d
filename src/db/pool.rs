use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

use crate::config::PoolSettings;

pub async fn create_pool(database_url: &str, settings: &PoolSettings) -> Result<PgPool, sqlx::Error> {
    tracing::debug!(
        max_connections = settings.max_connections,
        acquire_timeout_secs = settings.acquire_timeout.as_secs(),
        "Opening DTR connection pool"
    );

    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(1)
        .acquire_timeout(settings.acquire_timeout)
        .idle_timeout(Duration::from_secs(300))
        .connect(database_url)
        .await
}
