//! Job Repository
//!
//! Postgres-backed job records.

use async_trait::async_trait;
use dynwall_core::domain::job::{Job, JobStatus};
use sqlx::PgPool;
use std::path::PathBuf;
use uuid::Uuid;

use super::{JobStore, StoreError};

/// Job store on the `wallpapers` table
#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, job: &Job) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO wallpapers (id, status, light_input_path, dark_input_path, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(job.id)
        .bind(job.status.as_str())
        .bind(job.light_input_path.to_string_lossy().into_owned())
        .bind(job.dark_input_path.to_string_lossy().into_owned())
        .bind(job.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Err(StoreError::Conflict(job.id))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Job, StoreError> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, status, light_input_path, dark_input_path,
                   final_url, preview_url, created_at
            FROM wallpapers
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound(id))?;

        row.try_into()
    }

    async fn update_status(&self, id: Uuid, status: JobStatus) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE wallpapers SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn update_completion(
        &self,
        id: Uuid,
        final_url: &str,
        preview_url: Option<&str>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE wallpapers
            SET status = $1, final_url = $2, preview_url = $3
            WHERE id = $4
            "#,
        )
        .bind(JobStatus::Completed.as_str())
        .bind(final_url)
        .bind(preview_url)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError> {
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, status, light_input_path, dark_input_path,
                   final_url, preview_url, created_at
            FROM wallpapers
            WHERE status = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Job::try_from).collect()
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    status: String,
    light_input_path: String,
    dark_input_path: String,
    final_url: Option<String>,
    preview_url: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<JobStatus>().map_err(|e| StoreError::Corrupt {
            id: row.id,
            reason: e.to_string(),
        })?;

        Ok(Job {
            id: row.id,
            status,
            light_input_path: PathBuf::from(row.light_input_path),
            dark_input_path: PathBuf::from(row.dark_input_path),
            final_url: row.final_url.filter(|url| !url.is_empty()),
            preview_url: row.preview_url.filter(|url| !url.is_empty()),
            created_at: row.created_at,
        })
    }
}
