//! Job queue
//!
//! At-least-once channel carrying bare job ids from the submission path to
//! the single worker. A popped id is gone from the queue; nothing puts it
//! back if the worker dies mid-job.

mod memory;
mod redis_list;

pub use memory::InMemoryJobQueue;
pub use redis_list::RedisJobQueue;

use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

/// Queue error type
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Transport failure reaching the queue. The only failure the worker
    /// retries on its own.
    #[error("queue unavailable: {0}")]
    Unavailable(String),

    /// A payload that is not a job id
    #[error("malformed queue payload '{0}'")]
    MalformedPayload(String),
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Appends a job id; durable once this returns
    async fn enqueue(&self, id: Uuid) -> Result<(), QueueError>;

    /// Removes one id, waiting up to `timeout`. `None` means the wait expired.
    async fn dequeue_blocking(&self, timeout: Duration) -> Result<Option<Uuid>, QueueError>;
}

pub(crate) fn parse_payload(payload: &str) -> Result<Uuid, QueueError> {
    Uuid::parse_str(payload.trim()).map_err(|_| QueueError::MalformedPayload(payload.to_string()))
}
