use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    api::handler::{checkout, health_check, AppState},
    wallet::handlers::{get_wallet_balance, get_wallet_transactions, reconcile_wallet},
};

pub fn create_app(state: AppState) -> Router {
    info!("⚙️ Setting up HTTP routes...");

    let app = Router::new()
        // Public health check endpoint
        .route("/health", get(health_check))
        .nest(
            "/api/v1",
            Router::new()
                // Checkout
                .route("/checkout", post(checkout))
                // Wallet endpoints
                .route("/wallet", get(get_wallet_balance))
                .route("/wallet/transactions", get(get_wallet_transactions))
                // Admin endpoints
                .route("/admin/reconcile/:owner_id", get(reconcile_wallet)),
        )
        .layer(CompressionLayer::new())
        .layer(CorsLayer::very_permissive())
        // Add request tracing
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("✓ HTTP routes configured");
    app
}

pub async fn run_server(app: Router, bind_address: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("🌐 Server listening on: {}", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}
