use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create wallpapers table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS wallpapers (
            id UUID PRIMARY KEY,
            status VARCHAR(20) NOT NULL,
            light_input_path TEXT NOT NULL,
            dark_input_path TEXT NOT NULL,
            final_url TEXT,
            preview_url TEXT,
            created_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Gallery reads filter on status and sort by recency
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_wallpapers_status_created_at ON wallpapers(status, created_at DESC)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
