//! Service configuration
//!
//! Every setting comes from the environment. Server and worker modes share one
//! `Config` so both sides agree on database, queue and working directory
//! locations.

use anyhow::Context as _;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// What happens to a job's working directory once it reaches a terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupPolicy {
    /// Remove after success, keep after failure for inspection
    KeepFailed,
    /// Remove after any terminal status
    Always,
}

impl CleanupPolicy {
    fn parse(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "keep-failed" | "keep_failed" => Ok(CleanupPolicy::KeepFailed),
            "always" => Ok(CleanupPolicy::Always),
            other => anyhow::bail!(
                "WORKDIR_CLEANUP must be 'keep-failed' or 'always', got '{}'",
                other
            ),
        }
    }

    /// Whether a failed job's directory should be removed
    pub fn removes_failed(&self) -> bool {
        matches!(self, CleanupPolicy::Always)
    }
}

/// Object storage settings
///
/// Bucket and public URL are optional here: their absence only fails the
/// jobs that try to publish, it never stops the process.
#[derive(Clone, Default)]
pub struct StorageConfig {
    /// S3-compatible endpoint (explicit, or derived from the R2 account id)
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: Option<String>,
    pub public_url: Option<String>,
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key_set", &!self.secret_access_key.is_empty())
            .field("bucket", &self.bucket)
            .field("public_url", &self.public_url)
            .finish()
    }
}

/// External tool binaries used by the processing stages
#[derive(Debug, Clone)]
pub struct ToolsConfig {
    pub exiv2_bin: String,
    pub heif_enc_bin: String,
    pub magick_bin: String,
    /// Resize geometry handed to the preview tool (e.g. "800x800")
    pub preview_size: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            exiv2_bin: "exiv2".to_string(),
            heif_enc_bin: "heif-enc".to_string(),
            magick_bin: "magick".to_string(),
            preview_size: "800x800".to_string(),
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string
    pub database_url: String,

    /// Redis address of the job queue
    pub redis_url: String,

    /// Name of the queue list key
    pub queue_name: String,

    /// HTTP bind address (server mode)
    pub bind_addr: String,

    /// Parent directory of per-job working directories
    pub work_root: PathBuf,

    /// Directory holding the web UI assets
    pub static_dir: PathBuf,

    pub storage: StorageConfig,

    pub tools: ToolsConfig,

    /// Whether the preview stage runs and a preview is published
    pub preview_enabled: bool,

    pub cleanup_policy: CleanupPolicy,

    /// How long one blocking pop waits before the loop re-checks for shutdown
    pub dequeue_timeout: Duration,

    /// Fixed delay after a queue failure, also used between completion retries
    pub queue_retry_delay: Duration,

    /// Extra attempts for the final completion write
    pub completion_retries: u32,

    /// Upper bound for a submission request body
    pub max_upload_bytes: usize,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - DATABASE_URL, REDIS_URL, QUEUE_NAME, BIND_ADDR
    /// - WORK_ROOT, STATIC_DIR
    /// - R2_ACCOUNT_ID or S3_ENDPOINT, R2_ACCESS_KEY_ID, R2_SECRET_ACCESS_KEY
    /// - R2_BUCKET_NAME, R2_PUBLIC_URL
    /// - PREVIEW_ENABLED (default: true), WORKDIR_CLEANUP (default: keep-failed)
    /// - DEQUEUE_TIMEOUT, QUEUE_RETRY_DELAY (seconds, defaults: 5, 1)
    /// - COMPLETION_RETRIES (default: 3), MAX_UPLOAD_BYTES (default: 50 MiB)
    /// - EXIV2_BIN, HEIF_ENC_BIN, MAGICK_BIN, PREVIEW_SIZE
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let seconds = |key: &str, default: u64| {
            get(key)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(default))
        };

        let endpoint = get("S3_ENDPOINT").or_else(|| {
            get("R2_ACCOUNT_ID")
                .map(|account| format!("https://{}.r2.cloudflarestorage.com", account.trim()))
        });

        let storage = StorageConfig {
            endpoint,
            access_key_id: get("R2_ACCESS_KEY_ID").unwrap_or_default(),
            secret_access_key: get("R2_SECRET_ACCESS_KEY").unwrap_or_default(),
            bucket: get("R2_BUCKET_NAME"),
            public_url: get("R2_PUBLIC_URL"),
        };

        let defaults = ToolsConfig::default();
        let tools = ToolsConfig {
            exiv2_bin: get("EXIV2_BIN").unwrap_or(defaults.exiv2_bin),
            heif_enc_bin: get("HEIF_ENC_BIN").unwrap_or(defaults.heif_enc_bin),
            magick_bin: get("MAGICK_BIN").unwrap_or(defaults.magick_bin),
            preview_size: get("PREVIEW_SIZE").unwrap_or(defaults.preview_size),
        };

        let preview_enabled = match get("PREVIEW_ENABLED") {
            Some(value) => parse_bool(&value)
                .with_context(|| format!("PREVIEW_ENABLED has invalid value '{}'", value))?,
            None => true,
        };

        let cleanup_policy = match get("WORKDIR_CLEANUP") {
            Some(value) => CleanupPolicy::parse(&value)?,
            None => CleanupPolicy::KeepFailed,
        };

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| {
                "postgres://user:password@db:5432/wallpapers_db".to_string()
            }),
            redis_url: get("REDIS_URL").unwrap_or_else(|| "redis://redis:6379".to_string()),
            queue_name: get("QUEUE_NAME").unwrap_or_else(|| "wallpaper_jobs".to_string()),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            work_root: get("WORK_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            static_dir: get("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./static")),
            storage,
            tools,
            preview_enabled,
            cleanup_policy,
            dequeue_timeout: seconds("DEQUEUE_TIMEOUT", 5),
            queue_retry_delay: seconds("QUEUE_RETRY_DELAY", 1),
            completion_retries: get("COMPLETION_RETRIES")
                .and_then(|s| s.trim().parse::<u32>().ok())
                .unwrap_or(3),
            max_upload_bytes: get("MAX_UPLOAD_BYTES")
                .and_then(|s| s.trim().parse::<usize>().ok())
                .unwrap_or(50 * 1024 * 1024),
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database_url.is_empty() {
            anyhow::bail!("database_url cannot be empty");
        }

        if !self.redis_url.starts_with("redis://") && !self.redis_url.starts_with("rediss://") {
            anyhow::bail!("redis_url must start with redis:// or rediss://");
        }

        if self.queue_name.is_empty() {
            anyhow::bail!("queue_name cannot be empty");
        }

        if self.dequeue_timeout.as_secs() == 0 {
            anyhow::bail!("dequeue_timeout must be greater than 0");
        }

        if let Some(public_url) = &self.storage.public_url {
            if !public_url.starts_with("http://") && !public_url.starts_with("https://") {
                anyhow::bail!("R2_PUBLIC_URL must start with http:// or https://");
            }
        }

        if self.max_upload_bytes == 0 {
            anyhow::bail!("max_upload_bytes must be greater than 0");
        }

        Ok(())
    }

    /// Logs the loaded configuration without secret values
    pub fn log_summary(&self) {
        info!("----------- LOADED CONFIGURATION -----------");
        info!("Queue: {} ({})", self.queue_name, self.redis_url);
        info!("Work root: {}", self.work_root.display());
        info!("Storage endpoint: {:?}", self.storage.endpoint);
        info!("Storage access key id: [{}]", self.storage.access_key_id);
        info!(
            "Storage secret is set: {}",
            !self.storage.secret_access_key.is_empty()
        );
        info!("Bucket: {:?}", self.storage.bucket);
        info!("Public URL: {:?}", self.storage.public_url);
        info!(
            "Preview enabled: {}, cleanup policy: {:?}",
            self.preview_enabled, self.cleanup_policy
        );
        info!("--------------------------------------------");
    }
}

impl Default for Config {
    fn default() -> Self {
        // An empty lookup only hits defaults, which always parse.
        match Self::from_lookup(|_| None) {
            Ok(config) => config,
            Err(e) => unreachable!("default configuration failed to build: {e}"),
        }
    }
}

fn parse_bool(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("expected a boolean"),
    }
}
