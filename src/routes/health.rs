use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::config::VideoBackendMode;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub video_backend: VideoBackendMode,
    pub threads_login_available: bool,
    pub threads_logged_in: bool,
    pub persistent_session: bool,
    pub credits_balance: i64,
}

/// GET /health: service status and which backends are active.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let checks = HealthChecks {
        video_backend: state.availability.video_backend,
        threads_login_available: state.availability.threads_login,
        threads_logged_in: state.auth.is_logged_in().await,
        persistent_session: state.availability.persistent_session,
        credits_balance: state.ledger().balance().await,
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks,
    })
}
