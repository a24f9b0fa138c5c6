//! Redis list-backed job queue.
//!
//! - **Enqueue**: `LPUSH <queue> <id>`
//! - **Dequeue**: `BRPOP <queue> <timeout>`, so the oldest id comes out first
//!
//! The connection manager reconnects on its own after transport failures;
//! those failures surface as `QueueError::Unavailable` in the meantime.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{JobQueue, QueueError, parse_payload};

#[derive(Clone)]
pub struct RedisJobQueue {
    conn: ConnectionManager,
    key: String,
}

impl RedisJobQueue {
    /// Connect to Redis.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    /// * `key` - List key carrying job ids (e.g., "wallpaper_jobs")
    pub async fn connect(redis_url: &str, key: impl Into<String>) -> Result<Self, QueueError> {
        let client =
            redis::Client::open(redis_url).map_err(|e| QueueError::Unavailable(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;

        Ok(Self {
            conn,
            key: key.into(),
        })
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    #[instrument(skip(self), fields(queue = %self.key), err)]
    async fn enqueue(&self, id: Uuid) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("LPUSH")
            .arg(&self.key)
            .arg(id.to_string())
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;

        debug!("Enqueued job {}", id);
        Ok(())
    }

    async fn dequeue_blocking(&self, timeout: Duration) -> Result<Option<Uuid>, QueueError> {
        let mut conn = self.conn.clone();

        // BRPOP treats 0 as "wait forever"; keep at least one second so the
        // caller regains control periodically.
        let timeout_secs = timeout.as_secs().max(1);

        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(&self.key)
            .arg(timeout_secs)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;

        match popped {
            Some((_key, payload)) => parse_payload(&payload).map(Some),
            None => Ok(None),
        }
    }
}
