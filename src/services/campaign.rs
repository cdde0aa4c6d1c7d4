//! Campaign sharing on Threads.
//!
//! Every post goes through a container: create, wait until it is ready
//! (video only), publish, then fetch the permalink best-effort. A share is
//! `verified` only when publishing returned a post id.

use std::sync::Arc;

use garde::Validate;
use tracing::{debug, info, warn};

use crate::models::share::{
    CampaignShareOptions, CampaignShareResult, ContainerMedia, ContainerRequest, ContainerStatus,
    ShareContainer, ThreadsPostResult, ThreadsSession,
};
use crate::services::retry::{poll_until, PollError, PollStep, RetryPolicy};
use crate::services::session::SessionStoreError;
use crate::services::threads::{ThreadsApi, ThreadsError};
use crate::services::threads_auth::ThreadsAuth;

/// Longest post text Threads accepts, counted in characters.
pub const MAX_POST_CHARS: usize = 500;

pub struct CampaignShareOrchestrator {
    auth: Arc<ThreadsAuth>,
    api: Arc<dyn ThreadsApi>,
    container_policy: RetryPolicy,
}

impl CampaignShareOrchestrator {
    pub fn new(auth: Arc<ThreadsAuth>, api: Arc<dyn ThreadsApi>) -> Self {
        Self {
            auth,
            api,
            container_policy: RetryPolicy::container(),
        }
    }

    pub fn with_container_policy(mut self, policy: RetryPolicy) -> Self {
        self.container_policy = policy;
        self
    }

    /// Publish a campaign post, logging in first when no session is stored.
    pub async fn share_for_campaign(&self, options: &CampaignShareOptions) -> CampaignShareResult {
        if let Err(e) = options.validate() {
            return self.unverified("invalid", ShareError::Validation(e.to_string()));
        }

        let text = compose_campaign_text(options);
        let length = text.chars().count();
        if length > MAX_POST_CHARS {
            return self.unverified(
                "invalid",
                ShareError::Validation(format!(
                    "post text is {length} characters, the limit is {MAX_POST_CHARS}"
                )),
            );
        }

        if let Err(e) = self.ensure_session().await {
            warn!(error = %e, "Campaign share aborted, no Threads session");
            return self.unverified("login_failed", e);
        }

        let posted = if let Some(video_url) = non_empty(options.video_url.as_deref()) {
            self.post_video(video_url, Some(&text)).await
        } else if let Some(image_url) = non_empty(options.image_url.as_deref()) {
            self.post_image(image_url, Some(&text)).await
        } else {
            self.post_text(&text).await
        };

        let result = CampaignShareResult::from(posted);
        let outcome = if result.verified { "verified" } else { "unverified" };
        metrics::counter!("campaign_shares_total", "outcome" => outcome).increment(1);
        info!(
            verified = result.verified,
            post_id = result.post_id.as_deref().unwrap_or_default(),
            "Campaign share finished"
        );
        result
    }

    pub async fn post_text(&self, text: &str) -> ThreadsPostResult {
        let request = ContainerRequest {
            media: ContainerMedia::Text,
            text: Some(text.to_string()),
        };
        self.post(request, "Post published").await
    }

    pub async fn post_image(&self, image_url: &str, text: Option<&str>) -> ThreadsPostResult {
        let request = ContainerRequest {
            media: ContainerMedia::Image {
                image_url: image_url.to_string(),
            },
            text: text.map(str::to_string),
        };
        self.post(request, "Image post published").await
    }

    pub async fn post_video(&self, video_url: &str, text: Option<&str>) -> ThreadsPostResult {
        let request = ContainerRequest {
            media: ContainerMedia::Video {
                video_url: video_url.to_string(),
            },
            text: text.map(str::to_string),
        };
        self.post(request, "Video post published").await
    }

    async fn post(&self, request: ContainerRequest, success_message: &str) -> ThreadsPostResult {
        let published = match self.require_session().await {
            Ok(session) => self.publish_media(&session, request).await,
            Err(e) => Err(e),
        };

        match published {
            Ok(container) => ThreadsPostResult {
                success: true,
                post_id: container.post_id,
                permalink: container.permalink,
                message: success_message.to_string(),
            },
            Err(e) => {
                warn!(error = %e, "Threads post failed");
                ThreadsPostResult::failed(e.to_string())
            }
        }
    }

    async fn ensure_session(&self) -> Result<ThreadsSession, ShareError> {
        if let Some(session) = self.auth.session().await? {
            return Ok(session);
        }

        info!("No Threads session, starting login");
        let login = self.auth.login().await;
        if !login.success {
            return Err(ShareError::NotAuthenticated(
                login.message.unwrap_or_else(|| "Login failed".to_string()),
            ));
        }

        self.require_session().await
    }

    async fn require_session(&self) -> Result<ThreadsSession, ShareError> {
        let access_token = self
            .auth
            .access_token()
            .await?
            .ok_or_else(|| ShareError::NotAuthenticated("Please log in to Threads first".to_string()))?;
        let user_id = self
            .auth
            .user_id()
            .await?
            .ok_or_else(|| ShareError::NotAuthenticated("Threads user id not found".to_string()))?;

        Ok(ThreadsSession {
            access_token,
            user_id,
        })
    }

    async fn publish_media(
        &self,
        session: &ThreadsSession,
        request: ContainerRequest,
    ) -> Result<ShareContainer, ShareError> {
        let media_kind = request.media.kind();
        let container_id = self.api.create_container(session, &request).await?;
        let mut container = ShareContainer::created(container_id, media_kind);
        info!(
            container_id = %container.container_id,
            media_kind = %media_kind,
            "Threads container created"
        );

        if !container.processing_status.is_ready() {
            container.processing_status = self
                .wait_for_container(session, &container.container_id)
                .await?;
        }

        let post_id = self.api.publish(session, &container.container_id).await?;
        container.processing_status = ContainerStatus::Published;
        info!(container_id = %container.container_id, post_id = %post_id, "Threads post published");

        container.permalink = match self.api.permalink(session, &post_id).await {
            Ok(permalink) => permalink,
            Err(e) => {
                debug!(post_id = %post_id, error = %e, "Permalink lookup failed");
                None
            }
        };
        container.post_id = Some(post_id);
        Ok(container)
    }

    /// Poll a container until it is ready. ERROR and EXPIRED abort at once;
    /// request failures are retried within the policy's tolerance.
    async fn wait_for_container(
        &self,
        session: &ThreadsSession,
        container_id: &str,
    ) -> Result<ContainerStatus, ShareError> {
        let max_attempts = self.container_policy.max_attempts;
        let result = poll_until(&self.container_policy, container_id, |attempt| {
            let api = Arc::clone(&self.api);
            let session = session.clone();
            let container_id = container_id.to_string();
            async move {
                let report = api.container_status(&session, &container_id).await?;
                debug!(
                    container_id = %container_id,
                    attempt,
                    max_attempts,
                    status = %report.status,
                    "Polled container status"
                );

                let step = match report.status {
                    status if status.is_ready() => PollStep::Ready(Ok(status)),
                    ContainerStatus::Error => PollStep::Ready(Err(ShareError::MediaProcessing(
                        report
                            .error_message
                            .unwrap_or_else(|| "Threads could not process the video".to_string()),
                    ))),
                    ContainerStatus::Expired => PollStep::Ready(Err(ShareError::MediaProcessing(
                        report
                            .error_message
                            .unwrap_or_else(|| "Container expired before publishing".to_string()),
                    ))),
                    _ => PollStep::Pending,
                };
                Ok::<_, ThreadsError>(step)
            }
        })
        .await;

        match result {
            Ok(Ok(status)) => Ok(status),
            Ok(Err(e)) => {
                warn!(container_id, error = %e, "Container processing failed");
                Err(e)
            }
            Err(PollError::Exhausted { attempts }) => {
                warn!(container_id, attempts, "Container processing timed out");
                Err(ShareError::Timeout { attempts })
            }
            Err(PollError::Failed(e)) => Err(e.into()),
        }
    }

    fn unverified(&self, outcome: &'static str, error: ShareError) -> CampaignShareResult {
        metrics::counter!("campaign_shares_total", "outcome" => outcome).increment(1);
        CampaignShareResult {
            success: false,
            post_id: None,
            permalink: None,
            verified: false,
            message: Some(error.to_string()),
        }
    }
}

/// `campaign_text`, then `\n\n#hashtag`, then ` @mention`.
pub fn compose_campaign_text(options: &CampaignShareOptions) -> String {
    let mut text = options.campaign_text.clone();
    if let Some(hashtag) = non_empty(options.hashtag.as_deref()) {
        text.push_str("\n\n#");
        text.push_str(hashtag.trim_start_matches('#'));
    }
    if let Some(mention) = non_empty(options.mention.as_deref()) {
        text.push_str(" @");
        text.push_str(mention.trim_start_matches('@'));
    }
    text
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    #[error("{0}")]
    NotAuthenticated(String),

    #[error("{0}")]
    RemoteApi(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Video processing timed out after {attempts} status checks")]
    Timeout { attempts: u32 },

    #[error("Video processing failed: {0}")]
    MediaProcessing(String),

    #[error("Invalid share options: {0}")]
    Validation(String),

    #[error("Session store error: {0}")]
    Session(#[from] SessionStoreError),
}

impl From<ThreadsError> for ShareError {
    fn from(e: ThreadsError) -> Self {
        match e {
            ThreadsError::Http(e) => ShareError::Network(e.to_string()),
            ThreadsError::Api { message, .. } => ShareError::RemoteApi(message),
            ThreadsError::Parse(e) => ShareError::RemoteApi(e.to_string()),
            other @ ThreadsError::NotConfigured => ShareError::NotAuthenticated(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> CampaignShareOptions {
        CampaignShareOptions {
            campaign_text: "My reel".to_string(),
            hashtag: None,
            mention: None,
            image_url: None,
            video_url: None,
        }
    }

    #[test]
    fn test_compose_can_exceed_post_limit() {
        let mut o = options();
        o.campaign_text = "a".repeat(MAX_POST_CHARS);
        o.hashtag = Some("ReelFest".to_string());
        assert!(compose_campaign_text(&o).chars().count() > MAX_POST_CHARS);
    }

    #[test]
    fn test_compose_order() {
        let mut o = options();
        o.hashtag = Some("ReelFest".to_string());
        o.mention = Some("studio".to_string());
        assert_eq!(compose_campaign_text(&o), "My reel\n\n#ReelFest @studio");
    }

    #[test]
    fn test_compose_mention_only() {
        let mut o = options();
        o.mention = Some("@studio".to_string());
        assert_eq!(compose_campaign_text(&o), "My reel @studio");
    }

    #[test]
    fn test_compose_ignores_blank() {
        let mut o = options();
        o.hashtag = Some("  ".to_string());
        assert_eq!(compose_campaign_text(&o), "My reel");
    }

    #[test]
    fn test_timeout_message() {
        let e = ShareError::Timeout { attempts: 60 };
        assert!(e.to_string().contains("timed out"));
    }
}
