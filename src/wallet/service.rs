use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{AppError, AppResult, SettlementError};
use crate::ledger::{
    journal::{self, ReconciliationReport},
    models::{BalanceView, LedgerEntry, Wallet},
    store::LedgerStore,
};

/// Attempts at finding a free account number before giving up
const ACCOUNT_NUMBER_ATTEMPTS: usize = 5;

/// Wallet lookups and lazy account opening
pub struct WalletService {
    store: Arc<dyn LedgerStore>,
}

impl WalletService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn get_wallet(&self, owner_id: &str) -> AppResult<Wallet> {
        self.store
            .get_wallet(owner_id)
            .await?
            .ok_or_else(|| SettlementError::WalletNotFound(owner_id.to_string()).into())
    }

    /// Return the owner's wallet, opening one on first use
    pub async fn ensure_wallet(&self, owner_id: &str, contact_handle: &str) -> AppResult<Wallet> {
        for attempt in 1..=ACCOUNT_NUMBER_ATTEMPTS {
            if let Some(existing) = self.store.get_wallet(owner_id).await? {
                return Ok(existing);
            }

            let account_number = generate_account_number();
            if let Some(created) = self
                .store
                .insert_wallet(owner_id, &account_number, Some(contact_handle))
                .await?
            {
                info!("👛 Opened wallet {} for owner {}", created.account_number, owner_id);
                return Ok(created);
            }

            // Lost a race for the owner (next loop returns it) or the number is taken
            warn!("Wallet insert for {} did not apply (attempt {})", owner_id, attempt);
        }

        self.store
            .get_wallet(owner_id)
            .await?
            .ok_or_else(|| AppError::Internal("Could not allocate a unique account number".to_string()))
    }

    /// Non-authoritative balance view. Never use as the only gate for a debit.
    pub async fn get_available_balance(&self, owner_id: &str) -> AppResult<BalanceView> {
        Ok(self.get_wallet(owner_id).await?.balance_view())
    }

    pub async fn history(&self, owner_id: &str, limit: usize) -> AppResult<Vec<LedgerEntry>> {
        self.store.recent_entries(owner_id, limit).await
    }

    /// Replay the owner's legs and compare with the stored balance
    pub async fn reconcile(&self, owner_id: &str) -> AppResult<ReconciliationReport> {
        let wallet = self.get_wallet(owner_id).await?;
        let entries = self.store.entries_for_owner(owner_id).await?;
        let report = journal::reconcile(&wallet, &entries);

        if !report.balanced {
            warn!(
                "⚠️ Ledger drift on wallet {}: stored {} replayed {} ({} broken legs)",
                owner_id,
                report.stored_balance,
                report.replayed_balance,
                report.broken_legs.len()
            );
        }
        Ok(report)
    }
}

/// Human-shareable account number, e.g. `WLT-4821093375`
pub fn generate_account_number() -> String {
    let mut rng = rand::rng();
    let digits: String = (0..10)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect();
    format!("WLT-{}", digits)
}
