use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Lifecycle state of a remote LLM batch job.
///
/// The collaborator reports a few transitional states of its own. They are
/// folded into the nearest client state on decode: `validating` is still
/// queued, `finalizing` and `cancelling` are still in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BatchStatus {
    #[default]
    Queued,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Expired,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Queued => "queued",
            BatchStatus::InProgress => "in_progress",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
            BatchStatus::Cancelled => "cancelled",
            BatchStatus::Expired => "expired",
        }
    }

    pub fn from_wire(value: &str) -> Self {
        match value {
            "queued" | "validating" => BatchStatus::Queued,
            "in_progress" | "finalizing" | "cancelling" => BatchStatus::InProgress,
            "completed" => BatchStatus::Completed,
            "failed" => BatchStatus::Failed,
            "cancelled" => BatchStatus::Cancelled,
            "expired" => BatchStatus::Expired,
            other => {
                debug!(status = %other, "Unknown batch status, treating as queued");
                BatchStatus::Queued
            }
        }
    }

    /// No further transition is expected from a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchStatus::Completed
                | BatchStatus::Failed
                | BatchStatus::Cancelled
                | BatchStatus::Expired
        )
    }
}

impl From<String> for BatchStatus {
    fn from(value: String) -> Self {
        BatchStatus::from_wire(&value)
    }
}

impl From<BatchStatus> for String {
    fn from(status: BatchStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One remote batch job as last reported by the collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchJob {
    pub batch_id: String,
    #[serde(default)]
    pub status: BatchStatus,
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub output_file_id: Option<String>,
    #[serde(default)]
    pub error_file_id: Option<String>,
    #[serde(default)]
    pub input_file_id: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

impl BatchJob {
    pub fn new(batch_id: impl Into<String>, status: BatchStatus) -> Self {
        Self {
            batch_id: batch_id.into(),
            status,
            completed: 0,
            failed: 0,
            total: 0,
            created_at: None,
            output_file_id: None,
            error_file_id: None,
            input_file_id: None,
            filename: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_completed(&self) -> bool {
        self.status == BatchStatus::Completed
    }
}

/// Outcome of converting a crawl output folder into batch input files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertResult {
    #[serde(default)]
    pub output_folder: String,
    #[serde(default)]
    pub file_count: u64,
    #[serde(default)]
    pub batch_files_created: u64,
}

/// Outcome of downloading completed batch results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDownload {
    #[serde(default)]
    pub output_folder: String,
    #[serde(default)]
    pub total_files: u64,
    #[serde(default)]
    pub rejected_count: u64,
}
