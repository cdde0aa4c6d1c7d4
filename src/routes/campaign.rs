use axum::extract::State;
use axum::Json;

use crate::app_state::AppState;
use crate::models::api::ClaimRequest;
use crate::models::share::{CampaignShareOptions, CampaignShareResult, ClaimResult};

/// POST /api/v1/campaign/share: publish the campaign post.
///
/// Failures are reported in the body (`success`/`verified`/`message`).
pub async fn share(
    State(state): State<AppState>,
    Json(options): Json<CampaignShareOptions>,
) -> Json<CampaignShareResult> {
    Json(state.campaign.share_for_campaign(&options).await)
}

/// POST /api/v1/campaign/claim: re-check the post, then grant or deny.
pub async fn claim(
    State(state): State<AppState>,
    Json(body): Json<ClaimRequest>,
) -> Json<ClaimResult> {
    Json(state.rewards.claim_reward(&body.post_id).await)
}
