use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::models::job::{GenerationRequest, JobStatus, Quality, RemoteJob, CLIP_DURATION_SECS};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const SORA_MODEL: &str = "sora-2";

/// Remote job backend that renders videos.
#[async_trait]
pub trait VideoBackend: Send + Sync {
    /// Submit a render and return the remote job handle.
    async fn submit(&self, request: &GenerationRequest) -> Result<RemoteJob, VideoBackendError>;

    /// Fetch the current status of a remote job.
    async fn poll_status(&self, job_id: &str) -> Result<RemoteJob, VideoBackendError>;
}

/// Client for the OpenAI video generation (Sora) endpoints.
pub struct OpenAiVideoClient {
    http: Client,
    api_key: String,
    base_url: String,
}

#[derive(Deserialize)]
struct SoraVideo {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    error: Option<SoraError>,
}

#[derive(Deserialize)]
struct SoraError {
    message: String,
}

impl OpenAiVideoClient {
    pub fn new(api_key: &str) -> Result<Self, VideoBackendError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            api_key: api_key.to_string(),
            base_url: OPENAI_API_BASE.to_string(),
        })
    }

    /// Point the client at another API root (proxies, staging).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn to_remote_job(&self, video: SoraVideo) -> RemoteJob {
        let status = video
            .status
            .as_deref()
            .map(map_remote_status)
            .unwrap_or(JobStatus::Queued);

        let video_url = (status == JobStatus::Completed)
            .then(|| format!("{}/videos/{}/content", self.base_url, video.id));

        RemoteJob {
            job_id: video.id,
            status,
            video_url,
            thumbnail_url: None,
            error: video.error.map(|e| e.message),
            progress: video.progress.map(|p| p.clamp(0.0, 100.0) as u32),
        }
    }
}

#[async_trait]
impl VideoBackend for OpenAiVideoClient {
    async fn submit(&self, request: &GenerationRequest) -> Result<RemoteJob, VideoBackendError> {
        let form = reqwest::multipart::Form::new()
            .text("model", SORA_MODEL)
            .text("prompt", compose_prompt(request))
            .text("size", sora_size(request.quality))
            .text("seconds", CLIP_DURATION_SECS.to_string());

        let response = self
            .http
            .post(format!("{}/videos", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(VideoBackendError::Api(format!(
                "Generation request failed (status {status}): {text}"
            )));
        }

        let video: SoraVideo = serde_json::from_str(&text)?;
        Ok(self.to_remote_job(video))
    }

    async fn poll_status(&self, job_id: &str) -> Result<RemoteJob, VideoBackendError> {
        let response = self
            .http
            .get(format!("{}/videos/{}", self.base_url, job_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(VideoBackendError::Api(format!(
                "Status query failed (status {status}): {text}"
            )));
        }

        let video: SoraVideo = serde_json::from_str(&text)?;
        Ok(self.to_remote_job(video))
    }
}

/// Prompt sent to the model: the user's text followed by theme, style and camera.
pub fn compose_prompt(request: &GenerationRequest) -> String {
    let mut parts = vec![request.prompt.trim().to_string()];
    if !request.theme.is_empty() {
        parts.push(format!("Theme: {}", request.theme));
    }
    if !request.style.is_empty() {
        parts.push(format!("Style: {}", request.style));
    }
    if !request.camera.is_empty() {
        parts.push(format!("Camera: {}", request.camera));
    }
    parts.join(". ")
}

/// Vertical 9:16 frame sizes suited to Stories.
pub fn sora_size(quality: Quality) -> &'static str {
    match quality {
        Quality::Standard => "720x1280",
        Quality::High => "1024x1792",
    }
}

pub fn map_remote_status(status: &str) -> JobStatus {
    match status {
        "completed" => JobStatus::Completed,
        "failed" => JobStatus::Failed,
        "queued" => JobStatus::Queued,
        _ => JobStatus::Processing,
    }
}

const SAMPLE_VIDEOS: [&str; 3] = [
    "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/ForBiggerBlazes.mp4",
    "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/ForBiggerEscapes.mp4",
    "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/ForBiggerFun.mp4",
];

const SAMPLE_THUMBNAIL: &str = "https://via.placeholder.com/270x480/6C5CE7/FFFFFF?text=Video";

/// Stand-in backend used when no API key is configured.
///
/// Every poll waits `delay`, then resolves completed or, with probability
/// `failure_rate`, failed. Rates outside `0.0..=1.0` are clamped and a
/// non-finite rate means the backend never fails.
pub struct MockVideoBackend {
    delay: Duration,
    failure_rate: f64,
}

impl MockVideoBackend {
    pub fn new(delay: Duration, failure_rate: f64) -> Self {
        let failure_rate = if failure_rate.is_finite() {
            failure_rate.clamp(0.0, 1.0)
        } else {
            warn!(failure_rate, "Ignoring non-finite mock failure rate");
            0.0
        };
        Self { delay, failure_rate }
    }
}

impl Default for MockVideoBackend {
    fn default() -> Self {
        Self::new(Duration::from_millis(800), 0.1)
    }
}

#[async_trait]
impl VideoBackend for MockVideoBackend {
    async fn submit(&self, _request: &GenerationRequest) -> Result<RemoteJob, VideoBackendError> {
        Ok(RemoteJob::queued(format!("mock-{}", Uuid::new_v4().simple())))
    }

    async fn poll_status(&self, job_id: &str) -> Result<RemoteJob, VideoBackendError> {
        tokio::time::sleep(self.delay).await;

        let failed = rand::rng().random_bool(self.failure_rate);
        if failed {
            return Ok(RemoteJob {
                job_id: job_id.to_string(),
                status: JobStatus::Failed,
                video_url: None,
                thumbnail_url: None,
                error: Some("Simulated generation failure".to_string()),
                progress: Some(100),
            });
        }

        let pick = rand::rng().random_range(0..SAMPLE_VIDEOS.len());
        Ok(RemoteJob {
            job_id: job_id.to_string(),
            status: JobStatus::Completed,
            video_url: Some(SAMPLE_VIDEOS[pick].to_string()),
            thumbnail_url: Some(SAMPLE_THUMBNAIL.to_string()),
            error: None,
            progress: Some(100),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VideoBackendError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Api(String),

    #[error("Failed to parse video backend response: {0}")]
    Parse(#[from] serde_json::Error),
}
