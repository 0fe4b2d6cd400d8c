use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::EncoderError;

/// Job lifecycle. Declaration order is the only forward path; `Failed` is
/// reachable from any non-terminal status.
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "job_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Starting,
    Fragmenting,
    Encoding,
    Uploading,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }

    pub fn next(&self) -> Option<JobStatus> {
        match self {
            JobStatus::Pending => Some(JobStatus::Starting),
            JobStatus::Starting => Some(JobStatus::Fragmenting),
            JobStatus::Fragmenting => Some(JobStatus::Encoding),
            JobStatus::Encoding => Some(JobStatus::Uploading),
            JobStatus::Uploading => Some(JobStatus::Complete),
            JobStatus::Complete | JobStatus::Failed => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Starting => "STARTING",
            JobStatus::Fragmenting => "FRAGMENTING",
            JobStatus::Encoding => "ENCODING",
            JobStatus::Uploading => "UPLOADING",
            JobStatus::Complete => "COMPLETE",
            JobStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("job cannot move from {from} to {to}")]
pub struct StatusTransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

fn validate_id(id: &Uuid) -> Result<(), ValidationError> {
    if id.is_nil() {
        return Err(ValidationError::new("nil_id"));
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone, Default, Validate)]
pub struct Video {
    #[validate(custom(function = "validate_id"))]
    pub id: Uuid,
    pub resource_id: Option<String>,
    #[validate(length(min = 1, message = "file_path is required"))]
    pub file_path: String,
    #[validate(required(message = "created_at is required"))]
    #[serde(default, with = "time::serde::iso8601::option")]
    pub created_at: Option<OffsetDateTime>,
    #[sqlx(skip)]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub jobs: Vec<Job>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Job {
    pub id: Uuid,
    pub output_bucket_path: String,
    pub status: JobStatus,
    pub video_id: Uuid,
    #[sqlx(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<Video>,
    pub error: Option<String>,
    #[serde(with = "time::serde::iso8601")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::iso8601")]
    pub updated_at: OffsetDateTime,
}

impl Job {
    /// A fresh `Pending` job owning `video`.
    pub fn new(output_bucket_path: &str, video: Video) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            output_bucket_path: output_bucket_path.to_string(),
            status: JobStatus::Pending,
            video_id: video.id,
            video: Some(video),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn advance(&mut self, to: JobStatus) -> Result<(), StatusTransitionError> {
        let allowed = !self.status.is_terminal()
            && (to == JobStatus::Failed || self.status.next() == Some(to));
        if !allowed {
            return Err(StatusTransitionError {
                from: self.status,
                to,
            });
        }

        self.status = to;
        self.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    /// Marks the job `Failed` and records the cause. Returns false when the
    /// job had already reached a terminal status.
    pub fn fail(&mut self, cause: &EncoderError) -> bool {
        if self.advance(JobStatus::Failed).is_err() {
            return false;
        }
        self.error = Some(cause.to_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_video() -> Video {
        Video {
            id: Uuid::new_v4(),
            resource_id: Some(Uuid::new_v4().to_string()),
            file_path: "path".to_string(),
            created_at: Some(OffsetDateTime::now_utc()),
            jobs: vec![],
        }
    }

    #[test]
    fn default_video_is_invalid() {
        assert!(Video::default().validate().is_err());
    }

    #[test]
    fn nil_id_is_invalid() {
        let video = Video {
            id: Uuid::nil(),
            ..valid_video()
        };
        let errors = video.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("id"));
    }

    #[test]
    fn empty_file_path_is_invalid() {
        let video = Video {
            file_path: String::new(),
            ..valid_video()
        };
        let errors = video.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("file_path"));
    }

    #[test]
    fn complete_video_is_valid() {
        assert!(valid_video().validate().is_ok());
    }

    #[test]
    fn job_walks_every_status_in_order() {
        let mut job = Job::new("output", valid_video());
        assert_eq!(job.status, JobStatus::Pending);

        for status in [
            JobStatus::Starting,
            JobStatus::Fragmenting,
            JobStatus::Encoding,
            JobStatus::Uploading,
            JobStatus::Complete,
        ] {
            job.advance(status).unwrap();
        }
        assert_eq!(job.status, JobStatus::Complete);
    }

    #[test]
    fn job_cannot_skip_a_status() {
        let mut job = Job::new("output", valid_video());
        let err = job.advance(JobStatus::Encoding).unwrap_err();
        assert_eq!(err.from, JobStatus::Pending);
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn terminal_job_does_not_move() {
        let mut job = Job::new("output", valid_video());
        job.advance(JobStatus::Starting).unwrap();
        assert!(job.fail(&EncoderError::acquisition("bucket missing")));
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("Acquisition failed: bucket missing"));

        assert!(!job.fail(&EncoderError::cleanup("again")));
        assert!(job.advance(JobStatus::Fragmenting).is_err());
    }

    #[test]
    fn status_serializes_like_the_database_enum() {
        let json = serde_json::to_string(&JobStatus::Fragmenting).unwrap();
        assert_eq!(json, "\"FRAGMENTING\"");
        assert_eq!(JobStatus::Fragmenting.to_string(), "FRAGMENTING");
    }
}
