//! Recording test doubles for the video backend and the Threads collaborators.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use reel_campaign::{
    app_state::AppState,
    config::{ServiceAvailability, VideoBackendMode},
    models::{
        job::{GenerationRequest, JobStatus, Quality, RemoteJob},
        share::{ContainerRequest, ContainerStatus, ContainerStatusReport, ThreadsSession, ThreadsUser},
    },
    services::{
        credits::CreditLedger,
        generation::JobRegistry,
        retry::RetryPolicy,
        session::{MemorySessionStore, SessionStore},
        threads::{ThreadsApi, ThreadsError, ThreadsOAuth, TokenGrant},
        threads_auth::{AuthorizationOutcome, AuthorizationPrompt, CallbackPrompt, ThreadsAuth},
        video_backend::{VideoBackend, VideoBackendError},
    },
};

pub fn request(prompt: &str, quality: Quality) -> GenerationRequest {
    GenerationRequest {
        prompt: prompt.to_string(),
        theme: String::new(),
        style: String::new(),
        camera: String::new(),
        quality,
    }
}

// =============================================================================
// Video backend
// =============================================================================

#[derive(Debug, Clone)]
pub enum PollReply {
    Pending,
    Completed,
    Failed(&'static str),
    Error(&'static str),
    /// The poll itself panics.
    Panic,
}

pub struct ScriptedVideoBackend {
    script: Mutex<VecDeque<PollReply>>,
    fallback: PollReply,
    submit_calls: Arc<Mutex<Vec<GenerationRequest>>>,
    poll_calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedVideoBackend {
    /// Replies with `fallback` once the script runs out.
    pub fn new(script: Vec<PollReply>, fallback: PollReply) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            submit_calls: Arc::new(Mutex::new(Vec::new())),
            poll_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn completing_after(pending_polls: usize) -> Self {
        Self::new(vec![PollReply::Pending; pending_polls], PollReply::Completed)
    }

    pub fn submit_count(&self) -> usize {
        self.submit_calls.lock().unwrap().len()
    }

    pub fn poll_count(&self) -> usize {
        self.poll_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl VideoBackend for ScriptedVideoBackend {
    async fn submit(&self, request: &GenerationRequest) -> Result<RemoteJob, VideoBackendError> {
        let mut calls = self.submit_calls.lock().unwrap();
        calls.push(request.clone());
        Ok(RemoteJob::queued(format!("remote-{}", calls.len())))
    }

    async fn poll_status(&self, job_id: &str) -> Result<RemoteJob, VideoBackendError> {
        self.poll_calls.lock().unwrap().push(job_id.to_string());
        let reply = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        let mut job = RemoteJob::queued(job_id);
        match reply {
            PollReply::Pending => job.status = JobStatus::Processing,
            PollReply::Completed => {
                job.status = JobStatus::Completed;
                job.video_url = Some(format!("https://cdn.test/{job_id}.mp4"));
                job.thumbnail_url = Some(format!("https://cdn.test/{job_id}.jpg"));
            }
            PollReply::Failed(message) => {
                job.status = JobStatus::Failed;
                job.error = Some(message.to_string());
            }
            PollReply::Error(message) => return Err(VideoBackendError::Api(message.to_string())),
            PollReply::Panic => panic!("backend crashed while polling {job_id}"),
        }
        Ok(job)
    }
}

pub fn registry(balance: i64, backend: Arc<ScriptedVideoBackend>) -> Arc<JobRegistry> {
    Arc::new(JobRegistry::new(
        Arc::new(CreditLedger::new(balance)),
        backend,
        RetryPolicy::generation(),
    ))
}

// =============================================================================
// Threads Graph API
// =============================================================================

#[derive(Debug, Clone)]
pub enum StatusReply {
    Status(ContainerStatus),
    Errored(&'static str),
    /// The status request itself fails with a Graph API error.
    ApiUnavailable,
}

pub struct MockThreadsApi {
    status_script: Mutex<VecDeque<StatusReply>>,
    status_fallback: ContainerStatus,
    create_error: Mutex<Option<String>>,
    publish_error: Mutex<Option<String>>,
    permalink_fails: Mutex<bool>,
    live_posts: Arc<Mutex<HashSet<String>>>,
    create_calls: Arc<Mutex<Vec<ContainerRequest>>>,
    status_calls: Arc<Mutex<Vec<String>>>,
    publish_calls: Arc<Mutex<Vec<String>>>,
    permalink_calls: Arc<Mutex<Vec<String>>>,
    exists_calls: Arc<Mutex<Vec<String>>>,
}

impl MockThreadsApi {
    pub fn new() -> Self {
        Self {
            status_script: Mutex::new(VecDeque::new()),
            status_fallback: ContainerStatus::Finished,
            create_error: Mutex::new(None),
            publish_error: Mutex::new(None),
            permalink_fails: Mutex::new(false),
            live_posts: Arc::new(Mutex::new(HashSet::new())),
            create_calls: Arc::new(Mutex::new(Vec::new())),
            status_calls: Arc::new(Mutex::new(Vec::new())),
            publish_calls: Arc::new(Mutex::new(Vec::new())),
            permalink_calls: Arc::new(Mutex::new(Vec::new())),
            exists_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Container status replies, then `fallback` forever.
    pub fn with_statuses(mut self, script: Vec<StatusReply>, fallback: ContainerStatus) -> Self {
        self.status_script = Mutex::new(script.into());
        self.status_fallback = fallback;
        self
    }

    pub fn with_create_error(self, message: &str) -> Self {
        *self.create_error.lock().unwrap() = Some(message.to_string());
        self
    }

    pub fn with_publish_error(self, message: &str) -> Self {
        *self.publish_error.lock().unwrap() = Some(message.to_string());
        self
    }

    pub fn with_failing_permalink(self) -> Self {
        *self.permalink_fails.lock().unwrap() = true;
        self
    }

    pub fn delete_post(&self, post_id: &str) {
        self.live_posts.lock().unwrap().remove(post_id);
    }

    pub fn create_calls(&self) -> Vec<ContainerRequest> {
        self.create_calls.lock().unwrap().clone()
    }

    pub fn status_count(&self) -> usize {
        self.status_calls.lock().unwrap().len()
    }

    pub fn publish_count(&self) -> usize {
        self.publish_calls.lock().unwrap().len()
    }

    pub fn permalink_count(&self) -> usize {
        self.permalink_calls.lock().unwrap().len()
    }

    pub fn exists_count(&self) -> usize {
        self.exists_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ThreadsApi for MockThreadsApi {
    async fn create_container(
        &self,
        _session: &ThreadsSession,
        request: &ContainerRequest,
    ) -> Result<String, ThreadsError> {
        let mut calls = self.create_calls.lock().unwrap();
        calls.push(request.clone());
        if let Some(message) = self.create_error.lock().unwrap().clone() {
            return Err(ThreadsError::Api {
                message,
                code: Some(100),
            });
        }
        Ok(format!("container-{}", calls.len()))
    }

    async fn container_status(
        &self,
        _session: &ThreadsSession,
        container_id: &str,
    ) -> Result<ContainerStatusReport, ThreadsError> {
        self.status_calls.lock().unwrap().push(container_id.to_string());
        let reply = self
            .status_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(StatusReply::Status(self.status_fallback));

        match reply {
            StatusReply::Status(status) => Ok(ContainerStatusReport {
                status,
                error_message: None,
            }),
            StatusReply::Errored(message) => Ok(ContainerStatusReport {
                status: ContainerStatus::Error,
                error_message: Some(message.to_string()),
            }),
            StatusReply::ApiUnavailable => Err(ThreadsError::Api {
                message: "Service temporarily unavailable".to_string(),
                code: Some(2),
            }),
        }
    }

    async fn publish(&self, _session: &ThreadsSession, container_id: &str) -> Result<String, ThreadsError> {
        let mut calls = self.publish_calls.lock().unwrap();
        calls.push(container_id.to_string());
        if let Some(message) = self.publish_error.lock().unwrap().clone() {
            return Err(ThreadsError::Api {
                message,
                code: Some(24),
            });
        }
        let post_id = format!("post-{}", calls.len());
        self.live_posts.lock().unwrap().insert(post_id.clone());
        Ok(post_id)
    }

    async fn permalink(&self, _session: &ThreadsSession, post_id: &str) -> Result<Option<String>, ThreadsError> {
        self.permalink_calls.lock().unwrap().push(post_id.to_string());
        if *self.permalink_fails.lock().unwrap() {
            return Err(ThreadsError::Api {
                message: "Unsupported get request".to_string(),
                code: Some(100),
            });
        }
        Ok(Some(format!("https://www.threads.net/@reelmaker/post/{post_id}")))
    }

    async fn post_exists(&self, _session: &ThreadsSession, post_id: &str) -> Result<bool, ThreadsError> {
        self.exists_calls.lock().unwrap().push(post_id.to_string());
        Ok(self.live_posts.lock().unwrap().contains(post_id))
    }
}

// =============================================================================
// OAuth
// =============================================================================

pub struct MockOAuth {
    exchange_calls: Arc<Mutex<Vec<String>>>,
}

impl MockOAuth {
    pub fn new() -> Self {
        Self {
            exchange_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn exchange_count(&self) -> usize {
        self.exchange_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ThreadsOAuth for MockOAuth {
    fn authorize_url(&self, state: &str) -> String {
        format!("https://threads.net/oauth/authorize?client_id=test&state={state}")
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ThreadsError> {
        self.exchange_calls.lock().unwrap().push(code.to_string());
        Ok(TokenGrant {
            access_token: format!("token-for-{code}"),
            user_id: "1789".to_string(),
        })
    }

    async fn fetch_profile(&self, _access_token: &str, user_id: &str) -> Result<ThreadsUser, ThreadsError> {
        Ok(ThreadsUser {
            id: user_id.to_string(),
            username: "reelmaker".to_string(),
            name: Some("Reel Maker".to_string()),
            threads_profile_picture_url: None,
        })
    }
}

/// Prompt that answers every login with the same outcome.
pub struct ScriptedPrompt {
    outcome: AuthorizationOutcome,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedPrompt {
    pub fn new(outcome: AuthorizationOutcome) -> Self {
        Self {
            outcome,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl AuthorizationPrompt for ScriptedPrompt {
    async fn authorize(&self, authorize_url: &str, _state: &str) -> AuthorizationOutcome {
        self.calls.lock().unwrap().push(authorize_url.to_string());
        self.outcome.clone()
    }
}

/// Auth over an in-memory store, optionally already logged in.
pub async fn auth(prompt: Arc<ScriptedPrompt>, logged_in: bool) -> Arc<ThreadsAuth> {
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let auth = ThreadsAuth::new(store, Arc::new(MockOAuth::new()), prompt, true);
    if logged_in {
        auth.set_manual_auth("token-1", "1789", Some("reelmaker"))
            .await
            .unwrap();
    }
    Arc::new(auth)
}

// =============================================================================
// Application state
// =============================================================================

pub struct TestApp {
    pub state: AppState,
    pub backend: Arc<ScriptedVideoBackend>,
    pub threads: Arc<MockThreadsApi>,
    pub login_prompt: Arc<CallbackPrompt>,
}

pub fn test_app(balance: i64, backend: ScriptedVideoBackend, login_enabled: bool) -> TestApp {
    let backend = Arc::new(backend);
    let threads = Arc::new(MockThreadsApi::new());
    let login_prompt = Arc::new(CallbackPrompt::new(Duration::from_secs(30)));

    let jobs = JobRegistry::new(
        Arc::new(CreditLedger::new(balance)),
        Arc::clone(&backend) as Arc<dyn VideoBackend>,
        RetryPolicy::generation(),
    );
    let auth = ThreadsAuth::new(
        Arc::new(MemorySessionStore::new()),
        Arc::new(MockOAuth::new()),
        Arc::clone(&login_prompt) as Arc<dyn AuthorizationPrompt>,
        login_enabled,
    );
    let availability = ServiceAvailability {
        video_backend: VideoBackendMode::Mock,
        threads_login: login_enabled,
        persistent_session: false,
    };

    let state = AppState::new(
        availability,
        jobs,
        auth,
        Arc::clone(&login_prompt),
        Arc::clone(&threads) as Arc<dyn ThreadsApi>,
    );

    TestApp {
        state,
        backend,
        threads,
        login_prompt,
    }
}
