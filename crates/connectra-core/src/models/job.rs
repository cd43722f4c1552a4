//! Job, Edge, and job state-machine types (§3.1, §4.7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Job lifecycle state. See §4.7 for the full transition diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Open,
    InQueue,
    Processing,
    Completed,
    Failed,
    RetryInQueued,
}

impl JobStatus {
    /// A job is terminal once it either completed, or failed with no
    /// retries remaining.
    pub fn is_terminal(self, retry_count: i32) -> bool {
        matches!(self, JobStatus::Completed)
            || (matches!(self, JobStatus::Failed) && retry_count == 0)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Open => "open",
            JobStatus::InQueue => "in_queue",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::RetryInQueued => "retry_in_queued",
        };
        f.write_str(s)
    }
}

/// Scheduler run mode, selecting which jobs a producer tick is eligible to
/// claim (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    FirstTime,
    Retry,
}

/// Registered job type. New job types register a handler at init (§9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum JobType {
    InsertCsvFile,
    ExportCsvFile,
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobType::InsertCsvFile => "InsertCsvFile",
            JobType::ExportCsvFile => "ExportCsvFile",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for JobType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "InsertCsvFile" => Ok(JobType::InsertCsvFile),
            "ExportCsvFile" => Ok(JobType::ExportCsvFile),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown job_type: {other}"
            ))),
        }
    }
}

/// `job_response` payload (§3.1): carries the operator-facing outcome of a
/// job run. At least one field is populated once the job reaches a
/// terminal state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runtime_errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_key: Option<String>,
}

impl JobResponse {
    pub fn push_error(&mut self, error: impl Into<String>) {
        self.runtime_errors.push(error.into());
    }

    pub fn is_populated(&self) -> bool {
        self.message.is_some() || self.s3_key.is_some() || !self.runtime_errors.is_empty()
    }
}

/// A unit of scheduled work (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub uuid: Uuid,
    pub job_title: Option<String>,
    pub job_type: JobType,
    pub data: JsonValue,
    pub status: JobStatus,
    pub retry_count: i32,
    pub retry_interval: i64,
    pub run_after: DateTime<Utc>,
    pub job_response: JobResponse,
    /// Count of unresolved predecessor edges; a job with `degree > 0` must
    /// not be dispatched (§3.2).
    pub degree: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Decrement `retry_count`, bounded below at 0 (§4.1).
    pub fn decrement_retry_count(&mut self) {
        self.retry_count = (self.retry_count - 1).max(0);
    }
}

/// A directed edge `source → target` among Jobs (§3.1). Creating an edge
/// conceptually increments `target.degree`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Edge {
    pub source: Uuid,
    pub target: Uuid,
}

/// A node descriptor submitted as part of a DAG (§4.2's `SubmitDAG` input).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DagNode {
    pub uuid: Uuid,
    pub job_title: Option<String>,
    pub job_type: JobType,
    pub data: JsonValue,
    pub retry_count: i32,
    pub retry_interval: i64,
    pub edges: Vec<Uuid>,
}

/// `InsertCsvFile` job payload (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertCsvFilePayload {
    pub s3_key: String,
    #[serde(default)]
    pub s3_bucket: Option<String>,
    #[serde(default = "default_file_type")]
    pub file_type: String,
}

fn default_file_type() -> String {
    "csv".to_string()
}

/// `ExportCsvFile` job payload (§6, §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportCsvFilePayload {
    #[serde(default)]
    pub s3_bucket: Option<String>,
    pub service: String,
    pub vql: super::vql::VqlQuery,
    /// Column order written to the CSV; mandatory for export jobs (§4.9).
    pub select_columns: Vec<String>,
    pub upload_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_terminal_completed() {
        assert!(JobStatus::Completed.is_terminal(0));
        assert!(JobStatus::Completed.is_terminal(3));
    }

    #[test]
    fn test_job_status_terminal_failed_exhausted() {
        assert!(JobStatus::Failed.is_terminal(0));
        assert!(!JobStatus::Failed.is_terminal(1));
    }

    #[test]
    fn test_job_status_not_terminal_mid_flight() {
        assert!(!JobStatus::Open.is_terminal(3));
        assert!(!JobStatus::InQueue.is_terminal(3));
        assert!(!JobStatus::Processing.is_terminal(0));
    }

    #[test]
    fn test_job_status_display() {
        assert_eq!(JobStatus::RetryInQueued.to_string(), "retry_in_queued");
    }

    #[test]
    fn test_job_type_roundtrip() {
        use std::str::FromStr;
        assert_eq!(
            JobType::from_str("InsertCsvFile").unwrap(),
            JobType::InsertCsvFile
        );
        assert_eq!(JobType::InsertCsvFile.to_string(), "InsertCsvFile");
    }

    #[test]
    fn test_job_type_unknown_is_error() {
        use std::str::FromStr;
        assert!(JobType::from_str("FrobnicateFile").is_err());
    }

    #[test]
    fn test_decrement_retry_count_bounded_at_zero() {
        let mut job = sample_job();
        job.retry_count = 1;
        job.decrement_retry_count();
        assert_eq!(job.retry_count, 0);
        job.decrement_retry_count();
        assert_eq!(job.retry_count, 0);
    }

    #[test]
    fn test_job_response_is_populated() {
        let mut response = JobResponse::default();
        assert!(!response.is_populated());
        response.push_error("boom");
        assert!(response.is_populated());
    }

    fn sample_job() -> Job {
        Job {
            uuid: Uuid::new_v4(),
            job_title: None,
            job_type: JobType::InsertCsvFile,
            data: serde_json::json!({}),
            status: JobStatus::Open,
            retry_count: 3,
            retry_interval: 60,
            run_after: Utc::now(),
            job_response: JobResponse::default(),
            degree: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }
}
