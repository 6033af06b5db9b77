use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::info;

use crate::api::handler::AppState;
use crate::api::models::{HistoryQuery, TransactionHistoryResponse, TransactionView};
use crate::error::AppResult;
use crate::ledger::{journal::ReconciliationReport, models::BalanceView};
use crate::middleware::{AdminCaller, Caller};

const DEFAULT_HISTORY_LIMIT: usize = 50;
const MAX_HISTORY_LIMIT: usize = 200;

/// GET /api/v1/wallet - caller's balance
pub async fn get_wallet_balance(
    State(state): State<AppState>,
    caller: Caller,
) -> AppResult<Json<BalanceView>> {
    let view = state.wallets.get_available_balance(&caller.user_id).await?;
    Ok(Json(view))
}

/// GET /api/v1/wallet/transactions?limit=
pub async fn get_wallet_transactions(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<TransactionHistoryResponse>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    // 404 for callers who never opened a wallet
    state.wallets.get_wallet(&caller.user_id).await?;
    let entries = state.wallets.history(&caller.user_id, limit).await?;

    Ok(Json(TransactionHistoryResponse {
        owner_id: caller.user_id,
        transactions: entries.into_iter().map(TransactionView::from).collect(),
    }))
}

/// GET /api/v1/admin/reconcile/:owner_id - replay a wallet's ledger
pub async fn reconcile_wallet(
    State(state): State<AppState>,
    admin: AdminCaller,
    Path(owner_id): Path<String>,
) -> AppResult<Json<ReconciliationReport>> {
    info!("🔎 Reconcile of {} requested by {}", owner_id, admin.user_id);
    let report = state.wallets.reconcile(&owner_id).await?;
    Ok(Json(report))
}
