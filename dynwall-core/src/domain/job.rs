//! Job domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

/// A request to merge a light/dark image pair into one dynamic wallpaper.
///
/// Input paths point into the job's private working directory and are never
/// exposed to HTTP clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    #[serde(skip)]
    pub light_input_path: PathBuf,
    #[serde(skip)]
    pub dark_input_path: PathBuf,
    #[serde(default)]
    pub final_url: Option<String>,
    #[serde(default)]
    pub preview_url: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Job {
    /// Creates a freshly submitted job in the `Pending` state
    pub fn new(id: Uuid, light_input_path: PathBuf, dark_input_path: PathBuf) -> Self {
        Self {
            id,
            status: JobStatus::Pending,
            light_input_path,
            dark_input_path,
            final_url: None,
            preview_url: None,
            created_at: chrono::Utc::now(),
        }
    }

    /// The private working directory holding this job's inputs and artifacts
    pub fn working_dir(&self) -> &Path {
        self.light_input_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
    }
}

/// Job lifecycle status
///
/// Jobs only move forward: `Pending -> Processing -> {Completed, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Terminal states are never left again
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether moving from `self` to `next` follows the transition graph.
    ///
    /// Re-entering `Processing` from `Processing` is allowed so a redelivered
    /// job that was interrupted mid-flight can be picked up again.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown job status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_pending_without_urls() {
        let job = Job::new(
            Uuid::new_v4(),
            PathBuf::from("/tmp/x/light.png"),
            PathBuf::from("/tmp/x/dark.png"),
        );
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.final_url.is_none());
        assert!(job.preview_url.is_none());
        assert_eq!(job.working_dir(), Path::new("/tmp/x"));
    }

    #[test]
    fn test_transitions_only_move_forward() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Failed));

        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Processing));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Processing));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Failed));
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>(), Ok(status));
        }
        assert!("Queued".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_serialization_hides_input_paths() {
        let job = Job::new(
            Uuid::new_v4(),
            PathBuf::from("/tmp/x/light.png"),
            PathBuf::from("/tmp/x/dark.png"),
        );
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["status"], "pending");
        assert!(value.get("light_input_path").is_none());
        assert!(value.get("dark_input_path").is_none());
    }
}
