//! Threads Graph API client.
//!
//! Docs: <https://developers.facebook.com/docs/threads>

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::models::share::{
    ContainerMedia, ContainerRequest, ContainerStatusReport, MediaKind, ThreadsSession, ThreadsUser,
};

pub const THREADS_API_BASE: &str = "https://graph.threads.net/v1.0";
const THREADS_AUTH_URL: &str = "https://threads.net/oauth/authorize";
const THREADS_TOKEN_URL: &str = "https://graph.threads.net/oauth/access_token";

pub const THREADS_SCOPES: [&str; 3] = [
    "threads_basic",
    "threads_content_publish",
    "threads_manage_insights",
];

/// Container lifecycle and post lookups.
#[async_trait]
pub trait ThreadsApi: Send + Sync {
    /// `POST /{user_id}/threads`. Returns the container id.
    async fn create_container(
        &self,
        session: &ThreadsSession,
        request: &ContainerRequest,
    ) -> Result<String, ThreadsError>;

    /// `GET /{container_id}?fields=status,error_message`
    async fn container_status(
        &self,
        session: &ThreadsSession,
        container_id: &str,
    ) -> Result<ContainerStatusReport, ThreadsError>;

    /// `POST /{user_id}/threads_publish`. Returns the post id.
    async fn publish(&self, session: &ThreadsSession, container_id: &str) -> Result<String, ThreadsError>;

    async fn permalink(&self, session: &ThreadsSession, post_id: &str) -> Result<Option<String>, ThreadsError>;

    /// `Ok(false)` when Threads answers with an error payload or no id.
    async fn post_exists(&self, session: &ThreadsSession, post_id: &str) -> Result<bool, ThreadsError>;
}

/// Authorization-code login against Threads.
#[async_trait]
pub trait ThreadsOAuth: Send + Sync {
    fn authorize_url(&self, state: &str) -> String;

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ThreadsError>;

    async fn fetch_profile(&self, access_token: &str, user_id: &str) -> Result<ThreadsUser, ThreadsError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(deserialize_with = "string_or_number")]
    pub user_id: String,
}

#[derive(Clone)]
pub struct ThreadsClient {
    http: Client,
    app_id: String,
    app_secret: Option<String>,
    redirect_uri: String,
    base_url: String,
}

#[derive(Serialize)]
struct CreateContainerBody<'a> {
    media_type: MediaKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    video_url: Option<&'a str>,
    access_token: &'a str,
}

#[derive(Serialize)]
struct PublishBody<'a> {
    creation_id: &'a str,
    access_token: &'a str,
}

#[derive(Deserialize)]
struct IdResponse {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
}

#[derive(Deserialize)]
struct PermalinkResponse {
    #[serde(default)]
    permalink: Option<String>,
}

impl ThreadsClient {
    pub fn new(
        app_id: &str,
        app_secret: Option<&str>,
        redirect_uri: &str,
    ) -> Result<Self, ThreadsError> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            http,
            app_id: app_id.to_string(),
            app_secret: app_secret.map(str::to_string),
            redirect_uri: redirect_uri.to_string(),
            base_url: THREADS_API_BASE.to_string(),
        })
    }

    async fn get_graph<T: DeserializeOwned>(
        &self,
        path: &str,
        fields: &str,
        access_token: &str,
    ) -> Result<T, ThreadsError> {
        let response = self
            .http
            .get(format!("{}/{}", self.base_url, path))
            .query(&[("fields", fields), ("access_token", access_token)])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        parse_graph(status, &text)
    }

    async fn post_graph<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ThreadsError> {
        let response = self
            .http
            .post(format!("{}/{}", self.base_url, path))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        parse_graph(status, &text)
    }
}

#[async_trait]
impl ThreadsApi for ThreadsClient {
    async fn create_container(
        &self,
        session: &ThreadsSession,
        request: &ContainerRequest,
    ) -> Result<String, ThreadsError> {
        let (image_url, video_url) = match &request.media {
            ContainerMedia::Text => (None, None),
            ContainerMedia::Image { image_url } => (Some(image_url.as_str()), None),
            ContainerMedia::Video { video_url } => (None, Some(video_url.as_str())),
        };

        let body = CreateContainerBody {
            media_type: request.media.kind(),
            text: request.text.as_deref(),
            image_url,
            video_url,
            access_token: &session.access_token,
        };

        let created: IdResponse = self
            .post_graph(&format!("{}/threads", session.user_id), &body)
            .await?;
        Ok(created.id)
    }

    async fn container_status(
        &self,
        session: &ThreadsSession,
        container_id: &str,
    ) -> Result<ContainerStatusReport, ThreadsError> {
        self.get_graph(container_id, "status,error_message", &session.access_token)
            .await
    }

    async fn publish(&self, session: &ThreadsSession, container_id: &str) -> Result<String, ThreadsError> {
        let body = PublishBody {
            creation_id: container_id,
            access_token: &session.access_token,
        };
        let published: IdResponse = self
            .post_graph(&format!("{}/threads_publish", session.user_id), &body)
            .await?;
        Ok(published.id)
    }

    async fn permalink(&self, session: &ThreadsSession, post_id: &str) -> Result<Option<String>, ThreadsError> {
        let post: PermalinkResponse = self
            .get_graph(post_id, "id,permalink", &session.access_token)
            .await?;
        Ok(post.permalink)
    }

    async fn post_exists(&self, session: &ThreadsSession, post_id: &str) -> Result<bool, ThreadsError> {
        match self
            .get_graph::<IdResponse>(post_id, "id", &session.access_token)
            .await
        {
            Ok(post) => Ok(!post.id.is_empty()),
            Err(ThreadsError::Api { .. }) | Err(ThreadsError::Parse(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl ThreadsOAuth for ThreadsClient {
    fn authorize_url(&self, state: &str) -> String {
        let scope = THREADS_SCOPES.join(",");
        let params = [
            ("client_id", self.app_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("scope", scope.as_str()),
            ("response_type", "code"),
            ("state", state),
        ];
        match Url::parse_with_params(THREADS_AUTH_URL, &params) {
            Ok(url) => url.to_string(),
            Err(_) => THREADS_AUTH_URL.to_string(),
        }
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ThreadsError> {
        let app_secret = self.app_secret.as_deref().ok_or(ThreadsError::NotConfigured)?;
        let params = [
            ("client_id", self.app_id.as_str()),
            ("client_secret", app_secret),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code", code),
        ];

        let response = self.http.post(THREADS_TOKEN_URL).form(&params).send().await?;
        let status = response.status();
        let text = response.text().await?;
        parse_graph(status, &text)
    }

    async fn fetch_profile(&self, access_token: &str, user_id: &str) -> Result<ThreadsUser, ThreadsError> {
        self.get_graph(
            user_id,
            "id,username,name,threads_profile_picture_url",
            access_token,
        )
        .await
    }
}

/// Decode a Graph response, turning `{"error": ...}` payloads into `ThreadsError::Api`.
fn parse_graph<T: DeserializeOwned>(status: reqwest::StatusCode, text: &str) -> Result<T, ThreadsError> {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) if !status.is_success() => {
            return Err(ThreadsError::Api {
                message: format!("Status {status}: {text}"),
                code: None,
            })
        }
        Err(e) => return Err(ThreadsError::Parse(e)),
    };

    if let Some(error) = graph_error(&value) {
        return Err(error);
    }
    if !status.is_success() {
        return Err(ThreadsError::Api {
            message: format!("Status {status}: {text}"),
            code: None,
        });
    }

    Ok(serde_json::from_value(value)?)
}

/// Graph errors come as `{"error": {"message", "code"}}`; the token endpoint
/// sometimes answers `{"error": "...", "error_message": "..."}` instead.
fn graph_error(value: &Value) -> Option<ThreadsError> {
    let error = value.get("error")?;
    if error.is_null() {
        return None;
    }

    let message = error
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| value.get("error_message").and_then(Value::as_str))
        .or_else(|| error.as_str())
        .unwrap_or("Threads request failed")
        .to_string();
    let code = error.get("code").and_then(Value::as_i64);

    Some(ThreadsError::Api { message, code })
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ThreadsError {
    #[error("HTTP request to Threads failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message}")]
    Api { message: String, code: Option<i64> },

    #[error("Failed to parse Threads response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Threads login is not configured (missing app secret)")]
    NotConfigured,
}
