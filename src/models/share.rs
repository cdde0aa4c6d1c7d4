use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Media kind of a Threads post container.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum MediaKind {
    Text,
    Image,
    Video,
}

/// Processing status of a container as reported by Threads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "String")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerStatus {
    InProgress,
    Finished,
    Published,
    Error,
    Expired,
}

impl From<String> for ContainerStatus {
    fn from(value: String) -> Self {
        // Anything Threads adds later is treated as still processing.
        value.parse().unwrap_or(ContainerStatus::InProgress)
    }
}

impl ContainerStatus {
    /// Ready to publish.
    pub fn is_ready(self) -> bool {
        matches!(self, ContainerStatus::Finished | ContainerStatus::Published)
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, ContainerStatus::InProgress)
    }
}

/// Media attached to a container creation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerMedia {
    Text,
    Image { image_url: String },
    Video { video_url: String },
}

impl ContainerMedia {
    pub fn kind(&self) -> MediaKind {
        match self {
            ContainerMedia::Text => MediaKind::Text,
            ContainerMedia::Image { .. } => MediaKind::Image,
            ContainerMedia::Video { .. } => MediaKind::Video,
        }
    }
}

/// Payload for `POST /{user_id}/threads`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRequest {
    pub media: ContainerMedia,
    pub text: Option<String>,
}

/// One in-flight publish attempt. Never reused across attempts.
#[derive(Debug, Clone)]
pub struct ShareContainer {
    pub container_id: String,
    pub media_kind: MediaKind,
    pub processing_status: ContainerStatus,
    pub post_id: Option<String>,
    pub permalink: Option<String>,
}

impl ShareContainer {
    pub fn created(container_id: String, media_kind: MediaKind) -> Self {
        // Text and image containers are usable as soon as they exist.
        let processing_status = match media_kind {
            MediaKind::Video => ContainerStatus::InProgress,
            MediaKind::Text | MediaKind::Image => ContainerStatus::Finished,
        };
        Self {
            container_id,
            media_kind,
            processing_status,
            post_id: None,
            permalink: None,
        }
    }
}

/// Container status report from `GET /{container_id}?fields=status,error_message`.
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerStatusReport {
    pub status: ContainerStatus,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Authenticated Threads session read from the token store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadsSession {
    pub access_token: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThreadsUser {
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads_profile_picture_url: Option<String>,
}

/// Outcome of a single post operation.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ThreadsPostResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
    pub message: String,
}

impl ThreadsPostResult {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            post_id: None,
            permalink: None,
            message: message.into(),
        }
    }
}

/// Outcome of a login attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadsAuthResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<ThreadsUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Campaign share request. Hashtag and mention are given without `#`/`@`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CampaignShareOptions {
    #[garde(length(min = 1, max = 500))]
    pub campaign_text: String,

    #[garde(length(min = 1, max = 100))]
    pub hashtag: Option<String>,

    #[garde(length(min = 1, max = 100))]
    pub mention: Option<String>,

    #[garde(skip)]
    pub image_url: Option<String>,

    #[garde(skip)]
    pub video_url: Option<String>,
}

/// Result of a campaign share. `verified` is the sole gate for a reward.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignShareResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<ThreadsPostResult> for CampaignShareResult {
    fn from(result: ThreadsPostResult) -> Self {
        let verified = result.success && result.post_id.as_deref().is_some_and(|id| !id.is_empty());
        Self {
            success: result.success,
            post_id: result.post_id,
            permalink: result.permalink,
            verified,
            message: Some(result.message),
        }
    }
}

/// Result of a reward claim.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ClaimResult {
    pub granted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
