use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{Job, Video};
use crate::error::{EncoderError, EncoderResult};

/// Body of an inbound encoding request. Any `id` the producer sends is
/// ignored; the encoder always assigns its own.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct VideoMessage {
    #[serde(default)]
    pub resource_id: Option<String>,
    pub file_path: String,
}

impl VideoMessage {
    /// Rejects anything that is not a JSON object.
    pub fn check_structure(body: &[u8]) -> EncoderResult<()> {
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(_)) => Ok(()),
            Ok(other) => Err(EncoderError::malformed(format!(
                "expected a JSON object, got {}",
                json_type(&other)
            ))),
            Err(e) => Err(EncoderError::malformed(e.to_string())),
        }
    }

    pub fn decode(body: &[u8]) -> EncoderResult<Self> {
        serde_json::from_slice(body).map_err(|e| EncoderError::invalid_video(e.to_string()))
    }

    /// Stamps a fresh id and creation time onto the described video.
    pub fn into_video(self) -> Video {
        Video {
            id: Uuid::new_v4(),
            resource_id: self.resource_id,
            file_path: self.file_path,
            created_at: Some(OffsetDateTime::now_utc()),
            jobs: vec![],
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Published to the notification exchange once a message has been handled.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum JobNotification {
    Completed(Job),
    Failed {
        message: Value,
        error: String,
        kind: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        job_id: Option<Uuid>,
    },
}

impl JobNotification {
    pub fn failed(body: &[u8], job: Option<&Job>, error: &EncoderError) -> Self {
        // Keep the original payload readable even when it was not JSON.
        let message = serde_json::from_slice(body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()));

        JobNotification::Failed {
            message,
            error: error.to_string(),
            kind: error.kind(),
            job_id: job.map(|j| j.id),
        }
    }
}
