//! In-memory job store
//!
//! Same contract as the Postgres store, kept in a map. Used to drive the
//! lifecycle controller and HTTP handlers without a database.

use async_trait::async_trait;
use dynwall_core::domain::job::{Job, JobStatus};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::{JobStore, StoreError};

#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<Uuid, Job>>,
    /// Ids whose completion write fails, for exercising the stuck path
    failing_completions: Mutex<HashMap<Uuid, u32>>,
    /// Every status written, in order, per job
    history: Mutex<HashMap<Uuid, Vec<JobStatus>>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `times` completion writes for `id` fail
    pub fn fail_completions(&self, id: Uuid, times: u32) {
        self.failing_completions.lock().unwrap().insert(id, times);
    }

    /// Statuses written for `id`, starting with the one it was created with
    pub fn status_history(&self, id: Uuid) -> Vec<JobStatus> {
        self.history
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    fn record(&self, id: Uuid, status: JobStatus) {
        self.history
            .lock()
            .unwrap()
            .entry(id)
            .or_default()
            .push(status);
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: &Job) -> Result<(), StoreError> {
        let mut jobs = self.jobs.lock().unwrap();
        if jobs.contains_key(&job.id) {
            return Err(StoreError::Conflict(job.id));
        }
        jobs.insert(job.id, job.clone());
        drop(jobs);
        self.record(job.id, job.status);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Job, StoreError> {
        self.jobs
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn update_status(&self, id: Uuid, status: JobStatus) -> Result<(), StoreError> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        job.status = status;
        drop(jobs);
        self.record(id, status);
        Ok(())
    }

    async fn update_completion(
        &self,
        id: Uuid,
        final_url: &str,
        preview_url: Option<&str>,
    ) -> Result<(), StoreError> {
        {
            let mut failing = self.failing_completions.lock().unwrap();
            if let Some(remaining) = failing.get_mut(&id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
                }
            }
        }

        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        job.status = JobStatus::Completed;
        job.final_url = Some(final_url.to_string());
        job.preview_url = preview_url.map(str::to_string);
        drop(jobs);
        self.record(id, JobStatus::Completed);
        Ok(())
    }

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError> {
        let mut jobs: Vec<Job> = self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|job| job.status == status)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn job() -> Job {
        Job::new(
            Uuid::new_v4(),
            PathBuf::from("/work/j/light.png"),
            PathBuf::from("/work/j/dark.png"),
        )
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_id() {
        let store = InMemoryJobStore::new();
        let job = job();
        store.create(&job).await.unwrap();
        assert!(matches!(
            store.create(&job).await,
            Err(StoreError::Conflict(id)) if id == job.id
        ));
    }

    #[tokio::test]
    async fn test_get_unknown_id_is_not_found() {
        let store = InMemoryJobStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(store.get(id).await, Err(StoreError::NotFound(_))));
        assert!(matches!(
            store.update_status(id, JobStatus::Failed).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_completion_sets_status_and_urls_together() {
        let store = InMemoryJobStore::new();
        let job = job();
        store.create(&job).await.unwrap();

        store
            .update_completion(job.id, "https://cdn/w.heic", Some("https://cdn/p.jpg"))
            .await
            .unwrap();

        let stored = store.get(job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert_eq!(stored.final_url.as_deref(), Some("https://cdn/w.heic"));
        assert_eq!(stored.preview_url.as_deref(), Some("https://cdn/p.jpg"));
    }

    #[tokio::test]
    async fn test_failing_completion_leaves_record_untouched() {
        let store = InMemoryJobStore::new();
        let job = job();
        store.create(&job).await.unwrap();
        store.fail_completions(job.id, 1);

        assert!(store.update_completion(job.id, "u", None).await.is_err());
        assert_eq!(store.get(job.id).await.unwrap().status, JobStatus::Pending);

        store.update_completion(job.id, "u", None).await.unwrap();
        assert_eq!(
            store.get(job.id).await.unwrap().status,
            JobStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_list_by_status_is_newest_first() {
        let store = InMemoryJobStore::new();
        let mut older = job();
        older.created_at = chrono::Utc::now() - chrono::Duration::minutes(5);
        let newer = job();
        let other = job();

        store.create(&older).await.unwrap();
        store.create(&newer).await.unwrap();
        store.create(&other).await.unwrap();
        store.update_completion(older.id, "a", None).await.unwrap();
        store.update_completion(newer.id, "b", None).await.unwrap();

        let completed = store.list_by_status(JobStatus::Completed).await.unwrap();
        let ids: Vec<Uuid> = completed.iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }
}
