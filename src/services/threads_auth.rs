//! Threads login state: OAuth login, manual tokens, logout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use rand::Rng;
use tokio::sync::{broadcast, oneshot, Mutex};
use tracing::{info, warn};

use crate::models::share::{ThreadsAuthResult, ThreadsSession, ThreadsUser};
use crate::services::session::{SessionStore, SessionStoreError};
use crate::services::threads::{ThreadsError, ThreadsOAuth};

pub const ACCESS_TOKEN_KEY: &str = "threads_access_token";
pub const USER_ID_KEY: &str = "threads_user_id";
pub const USERNAME_KEY: &str = "threads_username";

const SESSION_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, USER_ID_KEY, USERNAME_KEY];

/// What the user did on the consent screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    Code(String),
    Cancelled,
}

/// Shows the consent screen to the user and reports the outcome.
#[async_trait]
pub trait AuthorizationPrompt: Send + Sync {
    async fn authorize(&self, authorize_url: &str, state: &str) -> AuthorizationOutcome;
}

/// Authorize URL published for one pending login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAnnouncement {
    pub state: String,
    pub authorize_url: String,
}

/// Prompt completed by the OAuth redirect hitting our callback route.
///
/// Each login registers its `state`; the callback resolves the matching
/// waiter. Unanswered prompts count as cancelled once `timeout` elapses.
pub struct CallbackPrompt {
    pending: Mutex<HashMap<String, oneshot::Sender<AuthorizationOutcome>>>,
    announcements: broadcast::Sender<LoginAnnouncement>,
    timeout: Duration,
}

impl CallbackPrompt {
    pub fn new(timeout: Duration) -> Self {
        let (announcements, _) = broadcast::channel(16);
        Self {
            pending: Mutex::new(HashMap::new()),
            announcements,
            timeout,
        }
    }

    /// Authorize URLs of logins started after this call, tagged with their state.
    pub fn subscribe(&self) -> broadcast::Receiver<LoginAnnouncement> {
        self.announcements.subscribe()
    }

    /// Deliver the callback outcome. Returns false for an unknown or expired state.
    pub async fn complete(&self, state: &str, outcome: AuthorizationOutcome) -> bool {
        let waiter = self.pending.lock().await.remove(state);
        match waiter {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl AuthorizationPrompt for CallbackPrompt {
    async fn authorize(&self, authorize_url: &str, state: &str) -> AuthorizationOutcome {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(state.to_string(), tx);
        // no subscribers is fine, the URL is logged below
        let _ = self.announcements.send(LoginAnnouncement {
            state: state.to_string(),
            authorize_url: authorize_url.to_string(),
        });

        info!(
            authorize_url,
            timeout_secs = self.timeout.as_secs(),
            "Open the authorize URL to connect Threads"
        );

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            _ => {
                self.pending.lock().await.remove(state);
                warn!("Threads authorization timed out");
                AuthorizationOutcome::Cancelled
            }
        }
    }
}

pub struct ThreadsAuth {
    store: Arc<dyn SessionStore>,
    oauth: Arc<dyn ThreadsOAuth>,
    prompt: Arc<dyn AuthorizationPrompt>,
    login_enabled: bool,
}

impl ThreadsAuth {
    pub fn new(
        store: Arc<dyn SessionStore>,
        oauth: Arc<dyn ThreadsOAuth>,
        prompt: Arc<dyn AuthorizationPrompt>,
        login_enabled: bool,
    ) -> Self {
        Self {
            store,
            oauth,
            prompt,
            login_enabled,
        }
    }

    pub fn login_enabled(&self) -> bool {
        self.login_enabled
    }

    /// Token and user id, if both are stored.
    pub async fn session(&self) -> Result<Option<ThreadsSession>, SessionStoreError> {
        let access_token = self.store.get(ACCESS_TOKEN_KEY).await?;
        let user_id = self.store.get(USER_ID_KEY).await?;
        Ok(match (access_token, user_id) {
            (Some(access_token), Some(user_id)) => Some(ThreadsSession {
                access_token,
                user_id,
            }),
            _ => None,
        })
    }

    pub async fn access_token(&self) -> Result<Option<String>, SessionStoreError> {
        self.store.get(ACCESS_TOKEN_KEY).await
    }

    pub async fn user_id(&self) -> Result<Option<String>, SessionStoreError> {
        self.store.get(USER_ID_KEY).await
    }

    pub async fn is_logged_in(&self) -> bool {
        matches!(self.access_token().await, Ok(Some(_)))
    }

    pub async fn current_user(&self) -> Option<ThreadsUser> {
        let session = self.session().await.ok()??;
        let username = self
            .store
            .get(USERNAME_KEY)
            .await
            .ok()
            .flatten()
            .unwrap_or_default();

        Some(ThreadsUser {
            id: session.user_id,
            username,
            name: None,
            threads_profile_picture_url: None,
        })
    }

    /// Run the authorization-code flow and store the resulting session.
    pub async fn login(&self) -> ThreadsAuthResult {
        self.login_with_state(generate_state()).await
    }

    /// Same as [`login`](Self::login) with a caller-chosen `state`, so the
    /// caller can match the authorize URL and callback to this login.
    pub async fn login_with_state(&self, state: String) -> ThreadsAuthResult {
        if !self.login_enabled {
            return login_failed("Threads login is not configured");
        }

        let url = self.oauth.authorize_url(&state);
        info!("Starting Threads login");

        let code = match self.prompt.authorize(&url, &state).await {
            AuthorizationOutcome::Cancelled => {
                info!("Threads login cancelled");
                return login_failed("Login cancelled");
            }
            AuthorizationOutcome::Code(code) if code.trim().is_empty() => {
                return login_failed("No authorization code returned");
            }
            AuthorizationOutcome::Code(code) => code,
        };

        let grant = match self.oauth.exchange_code(code.trim()).await {
            Ok(grant) => grant,
            Err(ThreadsError::Api { message, .. }) => {
                warn!(error = %message, "Threads token exchange rejected");
                return login_failed(message);
            }
            Err(e) => {
                warn!(error = %e, "Threads token exchange failed");
                return login_failed(e.to_string());
            }
        };

        let user = match self
            .oauth
            .fetch_profile(&grant.access_token, &grant.user_id)
            .await
        {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Could not fetch Threads profile, continuing without username");
                ThreadsUser {
                    id: grant.user_id.clone(),
                    username: String::new(),
                    name: None,
                    threads_profile_picture_url: None,
                }
            }
        };

        if let Err(e) = self
            .store
            .set_all(&[
                (ACCESS_TOKEN_KEY, grant.access_token.as_str()),
                (USER_ID_KEY, grant.user_id.as_str()),
                (USERNAME_KEY, user.username.as_str()),
            ])
            .await
        {
            warn!(error = %e, "Failed to store Threads session");
            return login_failed(e.to_string());
        }

        info!(user_id = %grant.user_id, username = %user.username, "Threads login succeeded");
        ThreadsAuthResult {
            success: true,
            user: Some(user),
            message: None,
        }
    }

    pub async fn logout(&self) -> Result<(), SessionStoreError> {
        self.store.clear_all(&SESSION_KEYS).await?;
        info!("Threads session cleared");
        Ok(())
    }

    /// Store a token obtained elsewhere (e.g. the developer dashboard).
    pub async fn set_manual_auth(
        &self,
        access_token: &str,
        user_id: &str,
        username: Option<&str>,
    ) -> Result<(), SessionStoreError> {
        let access_token = access_token.trim();
        let user_id = user_id.trim();
        let username = username.map(str::trim).unwrap_or_default();

        self.store
            .set_all(&[
                (ACCESS_TOKEN_KEY, access_token),
                (USER_ID_KEY, user_id),
                (USERNAME_KEY, username),
            ])
            .await?;
        info!(user_id, "Threads session set manually");
        Ok(())
    }
}

fn login_failed(message: impl Into<String>) -> ThreadsAuthResult {
    ThreadsAuthResult {
        success: false,
        user: None,
        message: Some(message.into()),
    }
}

/// Random URL-safe `state` for CSRF protection.
pub fn generate_state() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
