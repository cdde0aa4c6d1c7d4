use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::app_state::AppState;
use crate::models::api::{GenerateResponse, JobListResponse};
use crate::models::job::{GenerationJob, GenerationRequest};
use crate::routes::error::{ApiError, ApiResult};

/// POST /api/v1/generations: debit credits and start a render.
///
/// Answers immediately with the `processing` job; poll the job to follow it.
pub async fn create_generation(
    State(state): State<AppState>,
    Json(request): Json<GenerationRequest>,
) -> ApiResult<(StatusCode, Json<GenerateResponse>)> {
    let job = state.jobs.generate(request).await?;
    let balance = state.ledger().balance().await;

    Ok((
        StatusCode::ACCEPTED,
        Json(GenerateResponse {
            job,
            balance,
            message: "Generation started".to_string(),
        }),
    ))
}

/// GET /api/v1/generations: job history, newest first.
pub async fn list_generations(State(state): State<AppState>) -> Json<JobListResponse> {
    Json(JobListResponse {
        jobs: state.jobs.list().await,
    })
}

/// GET /api/v1/generations/{job_id}
pub async fn get_generation(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<GenerationJob>> {
    state
        .jobs
        .get(&job_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown generation job: {job_id}")))
}
