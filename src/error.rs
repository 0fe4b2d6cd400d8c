//! Failure taxonomy for message handling and the video pipeline.
//!
//! Every variant is local to one job (or one uploaded file). None of them
//! stops a worker pool.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::modules::encoding::model::StatusTransitionError;

pub type EncoderResult<T> = Result<T, EncoderError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeStage {
    Fragment,
    Package,
}

impl fmt::Display for TranscodeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscodeStage::Fragment => f.write_str("fragment"),
            TranscodeStage::Package => f.write_str("package"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Invalid video: {0}")]
    InvalidVideo(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Acquisition failed: {0}")]
    Acquisition(String),

    #[error("Transcoder failed during {stage}: {output}")]
    Transcode { stage: TranscodeStage, output: String },

    #[error("Cleanup failed: {0}")]
    Cleanup(String),

    #[error("Upload failed for {} file(s): {reason}", .failed.len())]
    Upload { failed: Vec<PathBuf>, reason: String },

    #[error(transparent)]
    InvalidTransition(#[from] StatusTransitionError),
}

impl EncoderError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedMessage(msg.into())
    }

    pub fn invalid_video(msg: impl Into<String>) -> Self {
        Self::InvalidVideo(msg.into())
    }

    pub fn persistence(err: impl fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn acquisition(err: impl fmt::Display) -> Self {
        Self::Acquisition(err.to_string())
    }

    pub fn transcode(stage: TranscodeStage, output: impl Into<String>) -> Self {
        Self::Transcode {
            stage,
            output: output.into(),
        }
    }

    pub fn cleanup(err: impl fmt::Display) -> Self {
        Self::Cleanup(err.to_string())
    }

    /// Stable tag carried by outbound notifications.
    pub fn kind(&self) -> &'static str {
        match self {
            EncoderError::MalformedMessage(_) => "malformed_message",
            EncoderError::InvalidVideo(_) => "invalid_video",
            EncoderError::Persistence(_) => "persistence_error",
            EncoderError::Acquisition(_) => "acquisition_error",
            EncoderError::Transcode { .. } => "transcode_error",
            EncoderError::Cleanup(_) => "cleanup_error",
            EncoderError::Upload { .. } => "upload_error",
            EncoderError::InvalidTransition(_) => "invalid_transition",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_error_reports_failed_count() {
        let err = EncoderError::Upload {
            failed: vec![PathBuf::from("/tmp/a"), PathBuf::from("/tmp/b")],
            reason: "connection reset".to_string(),
        };
        assert_eq!(err.to_string(), "Upload failed for 2 file(s): connection reset");
        assert_eq!(err.kind(), "upload_error");
    }

    #[test]
    fn transcode_error_names_the_stage() {
        let err = EncoderError::transcode(TranscodeStage::Package, "mp4dash: no such file");
        assert_eq!(
            err.to_string(),
            "Transcoder failed during package: mp4dash: no such file"
        );
    }

    #[test]
    fn illegal_transition_is_not_a_store_failure() {
        use crate::modules::encoding::model::JobStatus;

        let err = EncoderError::from(StatusTransitionError {
            from: JobStatus::Complete,
            to: JobStatus::Starting,
        });
        assert_eq!(err.kind(), "invalid_transition");
        assert_eq!(err.to_string(), "job cannot move from COMPLETE to STARTING");
    }
}
