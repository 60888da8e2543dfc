//! Managed transcoding
//!
//! Jobs are submitted once per upload and never tracked in the background.
//! The catalog asks for a job's status when a processing media record is read.

#[cfg(feature = "mediaconvert")]
pub mod mediaconvert;

use async_trait::async_trait;
use streamhub_core::AppError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("Job submission failed: {0}")]
    SubmitFailed(String),

    #[error("Job status lookup failed: {0}")]
    StatusFailed(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type TranscodeResult<T> = Result<T, TranscodeError>;

impl From<TranscodeError> for AppError {
    fn from(err: TranscodeError) -> Self {
        AppError::Transcode(err.to_string())
    }
}

/// Lifecycle of a transcoding job as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Submitted,
    Progressing,
    Complete,
    Error,
    Canceled,
}

impl JobStatus {
    /// `Error` and `Canceled` are final and mean no renditions will appear.
    pub fn is_failure(self) -> bool {
        matches!(self, JobStatus::Error | JobStatus::Canceled)
    }

    pub fn is_running(self) -> bool {
        matches!(self, JobStatus::Submitted | JobStatus::Progressing)
    }
}

/// Input for one HLS ladder job.
#[derive(Debug, Clone)]
pub struct TranscodeRequest {
    pub media_id: Uuid,
    /// Storage key of the finalized original upload.
    pub input_key: String,
}

#[async_trait]
pub trait TranscodeService: Send + Sync {
    /// Submit a job producing the full rendition ladder. Returns the job id.
    async fn submit_job(&self, request: &TranscodeRequest) -> TranscodeResult<String>;

    async fn job_status(&self, job_id: &str) -> TranscodeResult<JobStatus>;
}
