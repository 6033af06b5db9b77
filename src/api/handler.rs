use axum::{extract::State, Json};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use super::models::*;
use crate::{
    error::{AppError, AppResult},
    middleware::{Caller, ValidatedJson},
    settlement::SettlementEngine,
    wallet::WalletService,
};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SettlementEngine>,
    pub wallets: Arc<WalletService>,
}

/// Pay for a basket of products from the caller's wallet
/// POST /api/v1/checkout
pub async fn checkout(
    State(state): State<AppState>,
    caller: Caller,
    ValidatedJson(request): ValidatedJson<CheckoutRequest>,
) -> AppResult<Json<CheckoutResponse>> {
    info!("🛒 Checkout for {}: {:?}", caller.user_id, request.slugs);

    if let Some(currency) = &request.currency {
        if !currency.eq_ignore_ascii_case(state.engine.currency()) {
            return Err(AppError::InvalidInput(format!(
                "Wallet payments are only accepted in {}",
                state.engine.currency()
            )));
        }
    }

    // Wallets are opened lazily on first purchase
    state
        .wallets
        .ensure_wallet(&caller.user_id, &caller.phone)
        .await?;

    let outcome = state.engine.settle(&caller.user_id, &request.slugs).await?;

    Ok(Json(CheckoutResponse {
        order_id: outcome.order_id,
        order_number: outcome.order_number,
        transfer_id: outcome.transfer_id,
        activated: outcome.activated,
        total: outcome.total_charged,
        currency: outcome.currency,
        new_balance: outcome.new_balance,
    }))
}

/// GET /health - Health check
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
    })
}
