use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// OpenAI API key. Without it generations run against the mock backend.
    #[serde(default)]
    pub openai_api_key: Option<String>,

    /// Threads (Meta) app id
    #[serde(default)]
    pub threads_app_id: String,

    /// Threads app secret. Without it interactive login is disabled.
    #[serde(default)]
    pub threads_app_secret: Option<String>,

    /// OAuth redirect URI registered with the Threads app
    #[serde(default = "default_threads_redirect_uri")]
    pub threads_redirect_uri: String,

    /// Token store file. In-memory store when unset.
    #[serde(default)]
    pub session_store_path: Option<String>,

    /// AES-256-GCM key for the token store file (base64-encoded, 32 bytes)
    #[serde(default)]
    pub session_encryption_key: Option<String>,

    #[serde(default = "default_initial_credits")]
    pub initial_credits: i64,

    /// How long a login waits for the OAuth callback.
    #[serde(default = "default_login_timeout_secs")]
    pub login_timeout_secs: u64,

    #[serde(default = "default_mock_failure_rate")]
    pub mock_failure_rate: f64,

    #[serde(default = "default_mock_delay_ms")]
    pub mock_delay_ms: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_threads_redirect_uri() -> String {
    "http://localhost:3000/api/v1/threads/callback".to_string()
}

fn default_initial_credits() -> i64 {
    140
}

fn default_login_timeout_secs() -> u64 {
    300
}

fn default_mock_failure_rate() -> f64 {
    0.1
}

fn default_mock_delay_ms() -> u64 {
    800
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn openai_api_key(&self) -> Option<&str> {
        present(&self.openai_api_key)
    }

    pub fn threads_app_secret(&self) -> Option<&str> {
        present(&self.threads_app_secret)
    }

    pub fn session_store_path(&self) -> Option<&str> {
        present(&self.session_store_path)
    }

    pub fn session_encryption_key(&self) -> Option<&str> {
        present(&self.session_encryption_key)
    }
}

/// Empty environment variables count as unset.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoBackendMode {
    Remote,
    Mock,
}

/// Which external services are usable, decided once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceAvailability {
    pub video_backend: VideoBackendMode,
    pub threads_login: bool,
    pub persistent_session: bool,
}

impl ServiceAvailability {
    pub fn resolve(config: &AppConfig) -> Self {
        let video_backend = if config.openai_api_key().is_some() {
            VideoBackendMode::Remote
        } else {
            VideoBackendMode::Mock
        };

        Self {
            video_backend,
            threads_login: config.threads_app_secret().is_some()
                && !config.threads_app_id.trim().is_empty(),
            persistent_session: config.session_store_path().is_some(),
        }
    }
}
