pub mod campaign;
pub mod credits;
pub mod error;
pub mod generation;
pub mod health;
pub mod metrics;
pub mod threads;

use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;

/// Health and `/api/v1` routes. `/metrics` and middleware are added by the binary.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/credits", get(credits::get_balance))
        .route("/api/v1/credits/packs", get(credits::list_packs))
        .route("/api/v1/credits/purchase", post(credits::purchase_pack))
        .route(
            "/api/v1/generations",
            post(generation::create_generation).get(generation::list_generations),
        )
        .route(
            "/api/v1/generations/{job_id}",
            get(generation::get_generation),
        )
        .route("/api/v1/threads/login", post(threads::start_login))
        .route("/api/v1/threads/callback", get(threads::oauth_callback))
        .route("/api/v1/threads/me", get(threads::current_user))
        .route(
            "/api/v1/threads/session",
            axum::routing::put(threads::set_session).delete(threads::logout),
        )
        .route("/api/v1/campaign/share", post(campaign::share))
        .route("/api/v1/campaign/claim", post(campaign::claim))
        .with_state(state)
}
