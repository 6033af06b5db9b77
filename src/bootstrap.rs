use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{sync::Arc, time::Duration};
use tracing::info;

use crate::{
    api::handler::AppState,
    catalog::ProductRepository,
    config::Config,
    error::AppResult,
    fulfillment::{NotificationOutbox, SubscriptionRepository},
    ledger::{LedgerRepository, LedgerStore},
    orders::{OrderLedger, OrderRepository},
    settlement::{
        RecoveryConfig, RecoveryScheduleConfig, RecoveryScheduler, SettlementConfig,
        SettlementEngine, SettlementRecovery,
    },
    wallet::{TreasuryAccount, WalletService},
};

pub async fn initialize_app_state(config: &Config) -> AppResult<AppState> {
    info!("Initializing application components ...");

    // Database pool
    let pool = initialize_database(config).await?;

    // Core components
    let ledger: Arc<dyn LedgerStore> =
        Arc::new(LedgerRepository::new(pool.clone(), config.lock_timeout()));
    let orders: Arc<dyn OrderLedger> = Arc::new(OrderRepository::new(pool.clone()));
    let wallets = Arc::new(WalletService::new(ledger.clone()));

    // The hot path only locks the treasury row, it never creates it
    let treasury = TreasuryAccount::new(config.treasury.clone());
    treasury.bootstrap(ledger.as_ref()).await?;

    let engine = Arc::new(SettlementEngine::new(
        ledger.clone(),
        wallets.clone(),
        treasury,
        Arc::new(ProductRepository::new(pool.clone())),
        orders.clone(),
        Arc::new(SubscriptionRepository::new(pool.clone())),
        Arc::new(NotificationOutbox::new(pool.clone())),
        SettlementConfig {
            currency: config.wallet_currency.clone(),
            currency_scale: config.currency_scale,
        },
    ));
    info!(
        "✅ Settlement engine initialized ({} at {} decimals, lock timeout {}ms)",
        config.wallet_currency, config.currency_scale, config.lock_timeout_ms
    );

    // Start background recovery of interrupted settlements
    let recovery = Arc::new(SettlementRecovery::new(
        engine.clone(),
        ledger,
        orders,
        RecoveryConfig {
            grace: chrono::Duration::seconds(config.recovery_grace_secs as i64),
            lookback: chrono::Duration::hours(config.recovery_lookback_hours as i64),
            batch_size: config.recovery_batch_size,
        },
    ));
    RecoveryScheduler::new(
        RecoveryScheduleConfig {
            interval: Duration::from_secs(config.recovery_interval_secs.max(1)),
        },
        recovery,
    )
    .start();
    info!("✅ Settlement recovery task started");

    Ok(AppState { engine, wallets })
}

async fn initialize_database(config: &Config) -> AppResult<PgPool> {
    info!("📊 Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.database_url)
        .await?;

    info!(
        "✓ Database pool configured: {} max connections",
        config.db_max_connections
    );

    // Run migrations
    info!("🔄 Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("✓ Database initialized");
    Ok(pool)
}
