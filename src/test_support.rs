// Shared fixtures for unit tests: the full engine wired to in-memory stores.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::catalog::{InMemoryCatalog, Product};
use crate::config::TreasuryConfig;
use crate::fulfillment::{InMemoryActivator, InMemoryNotifier};
use crate::ledger::{memory::MemoryLedgerStore, store::LedgerStore};
use crate::orders::InMemoryOrderLedger;
use crate::settlement::{SettlementConfig, SettlementEngine};
use crate::wallet::{TreasuryAccount, WalletService};

pub const PAYER: &str = "user-42";
pub const PAYER_PHONE: &str = "+96890000042";
pub const TREASURY: &str = "platform-treasury";

pub fn product(slug: &str, price: Decimal, currency: &str) -> Product {
    Product {
        id: Uuid::new_v4(),
        slug: slug.to_string(),
        name: slug.replace('-', " "),
        program: slug.split('-').next().unwrap_or(slug).to_string(),
        plan: slug.rsplit('-').next().unwrap_or(slug).to_string(),
        duration_days: 30,
        price_amount: price,
        currency: currency.to_string(),
    }
}

pub struct Harness {
    pub engine: Arc<SettlementEngine>,
    pub wallets: Arc<WalletService>,
    pub store: MemoryLedgerStore,
    pub catalog: Arc<InMemoryCatalog>,
    pub orders: Arc<InMemoryOrderLedger>,
    pub activator: Arc<InMemoryActivator>,
    pub notifier: Arc<InMemoryNotifier>,
}

impl Harness {
    pub async fn new() -> Self {
        let harness = Self::without_treasury().await;
        harness
            .engine
            .treasury()
            .bootstrap(&harness.store)
            .await
            .unwrap();
        harness
    }

    /// Payer wallet exists, treasury row does not
    pub async fn without_treasury() -> Self {
        let store = MemoryLedgerStore::new(Duration::from_secs(2));
        let ledger: Arc<dyn LedgerStore> = Arc::new(store.clone());
        let wallets = Arc::new(WalletService::new(ledger.clone()));

        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.insert(product("fitness-monthly", dec!(3.500), "OMR"));
        catalog.insert(product("nutrition-weekly", dec!(2.250), "OMR"));
        catalog.insert(product("yoga-annual", dec!(4.000), "OMR"));
        catalog.insert(product("usd-course", dec!(10.00), "USD"));

        let orders = Arc::new(InMemoryOrderLedger::new());
        let activator = Arc::new(InMemoryActivator::new());
        let notifier = Arc::new(InMemoryNotifier::new());

        let engine = Arc::new(SettlementEngine::new(
            ledger,
            wallets.clone(),
            TreasuryAccount::new(TreasuryConfig {
                owner_id: TREASURY.to_string(),
                account_number: "TRS-0000000001".to_string(),
            }),
            catalog.clone(),
            orders.clone(),
            activator.clone(),
            notifier.clone(),
            SettlementConfig {
                currency: "OMR".to_string(),
                currency_scale: 3,
            },
        ));

        wallets.ensure_wallet(PAYER, PAYER_PHONE).await.unwrap();

        Self {
            engine,
            wallets,
            store,
            catalog,
            orders,
            activator,
            notifier,
        }
    }

    pub async fn fund(&self, owner_id: &str, amount: Decimal) {
        self.store.deposit(owner_id, amount).await.unwrap();
    }

    pub async fn balance(&self, owner_id: &str) -> Decimal {
        self.store.get_wallet(owner_id).await.unwrap().unwrap().balance
    }
}
