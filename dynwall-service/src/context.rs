//! Process context
//!
//! Shared handles built once at startup and passed explicitly to the HTTP
//! handlers and the worker loop.

use anyhow::{Context as _, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::db;
use crate::queue::{JobQueue, RedisJobQueue};
use crate::repository::{JobStore, PgJobStore};

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub store: Arc<dyn JobStore>,
    pub queue: Arc<dyn JobQueue>,
}

impl AppContext {
    pub fn new(config: Config, store: Arc<dyn JobStore>, queue: Arc<dyn JobQueue>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            queue,
        }
    }

    /// Connects to Postgres and Redis, running migrations on the way
    pub async fn connect(config: Config) -> Result<Self> {
        info!("Connecting to database...");
        let pool = connect_with_retry("database", || db::create_pool(&config.database_url))
            .await
            .context("Failed to create database pool")?;
        info!("Database connection pool created");

        db::run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;

        info!("Connecting to queue...");
        let queue = connect_with_retry("queue", || {
            RedisJobQueue::connect(&config.redis_url, config.queue_name.clone())
        })
        .await
        .context("Failed to connect to queue")?;
        info!("Queue connection established");

        Ok(Self::new(
            config,
            Arc::new(PgJobStore::new(pool)),
            Arc::new(queue),
        ))
    }
}

/// Retries a startup connection with exponential backoff.
///
/// Database and queue containers are often still starting when the service
/// comes up.
async fn connect_with_retry<T, E, F, Fut>(name: &str, mut connect: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    const MAX_RETRIES: u32 = 10;
    const INITIAL_DELAY_MS: u64 = 500;
    const MAX_DELAY_MS: u64 = 30_000;

    let mut attempt = 0;
    let mut delay_ms = INITIAL_DELAY_MS;

    loop {
        attempt += 1;

        match connect().await {
            Ok(value) => {
                if attempt > 1 {
                    info!("Connected to {} after {} attempt(s)", name, attempt);
                }
                return Ok(value);
            }
            Err(e) => {
                if attempt >= MAX_RETRIES {
                    error!("Failed to connect to {} after {} attempts", name, MAX_RETRIES);
                    return Err(e);
                }

                warn!(
                    "Failed to connect to {} (attempt {}/{}): {}",
                    name, attempt, MAX_RETRIES, e
                );
                warn!("Retrying in {} ms...", delay_ms);

                tokio::time::sleep(Duration::from_millis(delay_ms)).await;

                // Exponential backoff with cap
                delay_ms = (delay_ms * 2).min(MAX_DELAY_MS);
            }
        }
    }
}
