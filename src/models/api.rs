use serde::{Deserialize, Serialize};

use crate::models::job::GenerationJob;
use crate::models::share::ThreadsUser;

/// Response after submitting a generation request.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub job: GenerationJob,
    pub balance: i64,
    pub message: String,
}

/// Response for the job history listing.
#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<GenerationJob>,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: i64,
    pub display: String,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub pack_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub post_id: String,
}

/// Manually set Threads credentials.
#[derive(Debug, Deserialize)]
pub struct ManualAuthRequest {
    pub access_token: String,
    pub user_id: String,
    pub username: Option<String>,
}

/// Query string Threads appends to the OAuth redirect.
#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Returned when a login starts; the user opens `authorize_url` to continue.
#[derive(Debug, Serialize)]
pub struct LoginStartResponse {
    pub authorize_url: String,
}

#[derive(Debug, Serialize)]
pub struct ThreadsStatusResponse {
    pub logged_in: bool,
    pub login_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<ThreadsUser>,
}
