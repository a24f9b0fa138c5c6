//! In-process FIFO job queue

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

use super::{JobQueue, QueueError};

#[derive(Debug, Default)]
pub struct InMemoryJobQueue {
    items: Mutex<VecDeque<Uuid>>,
    notify: Notify,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, id: Uuid) -> Result<(), QueueError> {
        self.items.lock().unwrap().push_back(id);
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue_blocking(&self, timeout: Duration) -> Result<Option<Uuid>, QueueError> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let notified = self.notify.notified();

            if let Some(id) = self.items.lock().unwrap().pop_front() {
                return Ok(Some(id));
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }
}
