use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Length of every rendered clip, in seconds.
pub const CLIP_DURATION_SECS: u32 = 8;

/// Render quality. Unknown values fall back to `Standard`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case", from = "String")]
#[strum(serialize_all = "snake_case")]
pub enum Quality {
    #[default]
    Standard,
    High,
}

impl From<String> for Quality {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_default()
    }
}

/// Status of a generation job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// What the user asked to render.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GenerationRequest {
    #[garde(length(min = 1, max = 2000))]
    pub prompt: String,

    #[garde(skip)]
    #[serde(default)]
    pub theme: String,

    #[garde(skip)]
    #[serde(default)]
    pub style: String,

    #[garde(skip)]
    #[serde(default)]
    pub camera: String,

    #[garde(skip)]
    #[serde(default)]
    pub quality: Quality,
}

/// One requested video render, as kept in the session history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationJob {
    pub id: String,
    pub request: GenerationRequest,
    pub status: JobStatus,
    pub credits_cost: u32,
    pub duration_sec: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl GenerationJob {
    /// Placeholder record stored the moment credits are debited.
    pub fn draft(id: String, request: GenerationRequest, credits_cost: u32) -> Self {
        let now = Utc::now();
        Self {
            id,
            request,
            status: JobStatus::Processing,
            credits_cost,
            duration_sec: CLIP_DURATION_SECS,
            created_at: now,
            updated_at: now,
            video_url: None,
            thumbnail_url: None,
            error_message: None,
        }
    }

    pub fn complete(&mut self, video_url: Option<String>, thumbnail_url: Option<String>) {
        self.status = JobStatus::Completed;
        self.video_url = video_url;
        self.thumbnail_url = thumbnail_url;
        self.error_message = None;
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.video_url = None;
        self.thumbnail_url = None;
        self.error_message = Some(message.into());
        self.updated_at = Utc::now();
    }
}

/// Status snapshot reported by the remote generation backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteJob {
    pub job_id: String,
    pub status: JobStatus,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub error: Option<String>,
    pub progress: Option<u32>,
}

impl RemoteJob {
    pub fn queued(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Queued,
            video_url: None,
            thumbnail_url: None,
            error: None,
            progress: Some(0),
        }
    }
}
