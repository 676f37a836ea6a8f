//! Remote job model shared by the push and poll observation paths.
//!
//! A job lives on the video service; locally we only ever see snapshots
//! of it, either from a push notification or from a status query. Both
//! paths reduce what they observe to a [`JobStatus`].

use serde::{Deserialize, Serialize};

/// Remote status strings that mean the artifact is ready.
const COMPLETE_STATUSES: &[&str] = &["completed", "complete", "success"];

/// Remote status strings that mean the job will never produce an artifact.
const FAILED_STATUSES: &[&str] = &["failed", "fail", "error"];

/// Fallback reason when the service reports failure without one.
pub const UNKNOWN_FAILURE_REASON: &str = "Unknown error";

/// Observed state of a remote job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted but not finished. Carries the raw remote status for logs.
    Pending { raw: String },
    /// Finished; `result_reference` locates the produced artifact.
    Complete { result_reference: String },
    /// Finished without an artifact.
    Failed { failure_reason: String },
}

impl JobStatus {
    /// Classify a raw remote status string.
    ///
    /// Anything not recognised as complete or failed is pending. A
    /// complete status with no locator is reported as a failure since
    /// there is nothing the caller could consume.
    pub fn from_remote(
        status: &str,
        result_reference: Option<String>,
        failure_reason: Option<String>,
    ) -> Self {
        let normalized = status.trim().to_ascii_lowercase();
        if COMPLETE_STATUSES.contains(&normalized.as_str()) {
            match result_reference.filter(|r| !r.is_empty()) {
                Some(result_reference) => JobStatus::Complete { result_reference },
                None => JobStatus::Failed {
                    failure_reason: "job reported complete without a result locator".into(),
                },
            }
        } else if FAILED_STATUSES.contains(&normalized.as_str()) {
            JobStatus::Failed {
                failure_reason: failure_reason
                    .filter(|r| !r.is_empty())
                    .unwrap_or_else(|| UNKNOWN_FAILURE_REASON.to_string()),
            }
        } else {
            JobStatus::Pending { raw: normalized }
        }
    }

    /// `complete` and `failed` are terminal; no further transitions occur.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending { .. })
    }
}

/// Terminal result of a job, as consumed by the caller exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    Complete { result_reference: String },
    Failed { failure_reason: String },
}
