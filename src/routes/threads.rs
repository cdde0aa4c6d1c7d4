use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use tokio::sync::broadcast::error::RecvError;

use crate::app_state::AppState;
use crate::models::api::{
    LoginStartResponse, ManualAuthRequest, MessageResponse, OAuthCallbackQuery,
    ThreadsStatusResponse,
};
use crate::routes::error::{ApiError, ApiResult};
use crate::services::threads_auth::{generate_state, AuthorizationOutcome};

/// How long to wait for the login task to produce its authorize URL.
const LOGIN_URL_WAIT: Duration = Duration::from_secs(5);

async fn status(state: &AppState) -> ThreadsStatusResponse {
    ThreadsStatusResponse {
        logged_in: state.auth.is_logged_in().await,
        login_available: state.availability.threads_login,
        user: state.auth.current_user().await,
    }
}

/// POST /api/v1/threads/login: start an OAuth login in the background.
///
/// Returns the authorize URL; the login completes when Threads redirects to
/// the callback route.
pub async fn start_login(State(state): State<AppState>) -> ApiResult<Json<LoginStartResponse>> {
    if !state.auth.login_enabled() {
        return Err(ApiError::Unavailable(
            "Threads login is not configured".to_string(),
        ));
    }

    let login_state = generate_state();
    let mut announcements = state.login_prompt.subscribe();
    let auth = Arc::clone(&state.auth);
    let task_state = login_state.clone();
    tokio::spawn(async move {
        let result = auth.login_with_state(task_state).await;
        if !result.success {
            tracing::info!(
                reason = result.message.as_deref().unwrap_or_default(),
                "Background Threads login ended without a session"
            );
        }
    });

    // other logins may announce on the same channel
    let own_url = async {
        loop {
            match announcements.recv().await {
                Ok(announced) if announced.state == login_state => {
                    return Some(announced.authorize_url);
                }
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    };

    match tokio::time::timeout(LOGIN_URL_WAIT, own_url).await {
        Ok(Some(authorize_url)) => Ok(Json(LoginStartResponse { authorize_url })),
        _ => Err(ApiError::Internal(
            "Login did not produce an authorize URL".to_string(),
        )),
    }
}

/// GET /api/v1/threads/callback: OAuth redirect target.
pub async fn oauth_callback(
    State(state): State<AppState>,
    Query(query): Query<OAuthCallbackQuery>,
) -> ApiResult<Json<MessageResponse>> {
    let login_state = query
        .state
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing state parameter".to_string()))?;

    let outcome = match (&query.error, query.code) {
        (Some(error), _) => {
            tracing::info!(
                error = %error,
                description = query.error_description.as_deref().unwrap_or_default(),
                "Threads authorization denied"
            );
            AuthorizationOutcome::Cancelled
        }
        (None, Some(code)) => AuthorizationOutcome::Code(code),
        (None, None) => AuthorizationOutcome::Code(String::new()),
    };
    let denied = outcome == AuthorizationOutcome::Cancelled;

    if !state.login_prompt.complete(login_state, outcome).await {
        return Err(ApiError::NotFound(
            "Unknown or expired login state".to_string(),
        ));
    }

    let message = if denied {
        "Login cancelled"
    } else {
        "Authorization received, you can close this window"
    };
    Ok(Json(MessageResponse {
        message: message.to_string(),
    }))
}

/// GET /api/v1/threads/me
pub async fn current_user(State(state): State<AppState>) -> Json<ThreadsStatusResponse> {
    Json(status(&state).await)
}

/// PUT /api/v1/threads/session: store a token obtained outside the OAuth flow.
pub async fn set_session(
    State(state): State<AppState>,
    Json(body): Json<ManualAuthRequest>,
) -> ApiResult<Json<ThreadsStatusResponse>> {
    if body.access_token.trim().is_empty() || body.user_id.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "access_token and user_id are required".to_string(),
        ));
    }

    state
        .auth
        .set_manual_auth(&body.access_token, &body.user_id, body.username.as_deref())
        .await?;
    Ok(Json(status(&state).await))
}

/// DELETE /api/v1/threads/session
pub async fn logout(State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.auth.logout().await?;
    Ok(StatusCode::NO_CONTENT)
}
