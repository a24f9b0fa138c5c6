//! Repository Module
//!
//! Durable job records. The `JobStore` trait is the seam between the
//! lifecycle controller and its storage so the controller can be driven
//! against the in-memory store in tests.

mod job;
mod memory;

pub use job::PgJobStore;
pub use memory::InMemoryJobStore;

use async_trait::async_trait;
use dynwall_core::domain::job::{Job, JobStatus};
use uuid::Uuid;

/// Job record store error
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("job {0} already exists")]
    Conflict(Uuid),

    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error("job {id} has an unreadable record: {reason}")]
    Corrupt { id: Uuid, reason: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence contract for job records.
///
/// Each method is a single-row atomic operation; no other locking is done.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persists a new record, failing with `Conflict` if the id exists
    async fn create(&self, job: &Job) -> Result<(), StoreError>;

    /// Loads the current record
    async fn get(&self, id: Uuid) -> Result<Job, StoreError>;

    /// Sets the status alone (used for `processing` and `failed`)
    async fn update_status(&self, id: Uuid, status: JobStatus) -> Result<(), StoreError>;

    /// Sets `completed` together with the result URLs in one write
    async fn update_completion(
        &self,
        id: Uuid,
        final_url: &str,
        preview_url: Option<&str>,
    ) -> Result<(), StoreError>;

    /// All jobs with `status`, newest first
    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError>;
}
