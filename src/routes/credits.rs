use axum::extract::State;
use axum::Json;

use crate::app_state::AppState;
use crate::models::api::{BalanceResponse, PurchaseRequest};
use crate::routes::error::ApiResult;
use crate::services::credits::{format_credits, CreditPack, CREDIT_PACKS};

fn balance_response(balance: i64) -> BalanceResponse {
    BalanceResponse {
        balance,
        display: format_credits(balance),
    }
}

/// GET /api/v1/credits
pub async fn get_balance(State(state): State<AppState>) -> Json<BalanceResponse> {
    Json(balance_response(state.ledger().balance().await))
}

/// GET /api/v1/credits/packs
pub async fn list_packs() -> Json<Vec<CreditPack>> {
    Json(CREDIT_PACKS.to_vec())
}

/// POST /api/v1/credits/purchase: add a credit pack to the balance.
pub async fn purchase_pack(
    State(state): State<AppState>,
    Json(body): Json<PurchaseRequest>,
) -> ApiResult<Json<BalanceResponse>> {
    let balance = state.ledger().purchase(body.pack_id.trim()).await?;
    Ok(Json(balance_response(balance)))
}
