use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::journal::NewLedgerEntry;
use super::models::{LedgerEntry, Wallet};
use crate::error::AppResult;

/// Storage for wallets and their ledger legs
///
/// Balance mutations only happen through a [`LedgerTx`]; everything on this
/// trait is either a read or an idempotent insert.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a transaction whose row locks wait at most the store's lock timeout
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>>;

    /// Unlocked read of the last committed state
    async fn get_wallet(&self, owner_id: &str) -> AppResult<Option<Wallet>>;

    /// Insert a zero-balance wallet. Returns `None` when either the owner or
    /// the account number already exists.
    async fn insert_wallet(
        &self,
        owner_id: &str,
        account_number: &str,
        contact_handle: Option<&str>,
    ) -> AppResult<Option<Wallet>>;

    async fn get_entry(&self, id: Uuid) -> AppResult<Option<LedgerEntry>>;

    /// All legs of one wallet, oldest first
    async fn entries_for_owner(&self, owner_id: &str) -> AppResult<Vec<LedgerEntry>>;

    /// Most recent legs of one wallet, newest first
    async fn recent_entries(&self, owner_id: &str, limit: usize) -> AppResult<Vec<LedgerEntry>>;

    /// Settlement debit legs (those carrying a purchase) created in `[from, to)`
    async fn purchase_legs_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<LedgerEntry>>;
}

/// An open ledger transaction
///
/// Dropping it without calling `commit` discards every write.
#[async_trait]
pub trait LedgerTx: Send {
    /// Lock the wallet row and return its current balance
    async fn lock_wallet(&mut self, owner_id: &str) -> AppResult<Option<Wallet>>;

    /// Persist a new balance for a row locked by this transaction
    async fn update_balance(&mut self, owner_id: &str, balance: Decimal) -> AppResult<Wallet>;

    /// Append a leg. Insert only.
    async fn append(&mut self, entry: NewLedgerEntry) -> AppResult<LedgerEntry>;

    async fn commit(self: Box<Self>) -> AppResult<()>;

    async fn rollback(self: Box<Self>) -> AppResult<()>;
}
