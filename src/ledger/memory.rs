//! In-process ledger store.
//!
//! Mirrors the PostgreSQL semantics the settlement engine relies on: each
//! wallet row has its own lock acquired with a deadline, unlocked reads see
//! the last committed state, and writes become visible only on commit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};
use uuid::Uuid;

use super::journal::NewLedgerEntry;
use super::models::{LedgerEntry, Wallet};
use super::store::{LedgerStore, LedgerTx};
use crate::error::{AppError, AppResult, SettlementError};

/// Counterparty recorded on legs created by [`MemoryLedgerStore::deposit`]
pub const FUNDING_OWNER_ID: &str = "external-funding";
pub const FUNDING_ACCOUNT_NUMBER: &str = "EXT-0000000000";

struct Row {
    lock: Arc<RowLock<()>>,
    wallet: Wallet,
}

#[derive(Default)]
struct State {
    rows: HashMap<String, Row>,
    account_numbers: HashSet<String>,
    journal: Vec<LedgerEntry>,
}

#[derive(Clone)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<State>>,
    lock_timeout: Duration,
    lock_trace: Arc<Mutex<Vec<String>>>,
}

impl MemoryLedgerStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            lock_timeout,
            lock_trace: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Owner ids in the order their row locks were granted
    pub fn lock_trace(&self) -> Vec<String> {
        self.lock_trace.lock().clone()
    }

    pub fn clear_lock_trace(&self) {
        self.lock_trace.lock().clear();
    }

    /// Every committed leg, in commit order
    pub fn journal(&self) -> Vec<LedgerEntry> {
        self.state.lock().journal.clone()
    }

    /// Credit a wallet from outside the platform, recording a `transfer_in`
    /// leg so the wallet still replays from zero.
    pub async fn deposit(&self, owner_id: &str, amount: Decimal) -> AppResult<LedgerEntry> {
        let funding = Wallet {
            owner_id: FUNDING_OWNER_ID.to_string(),
            account_number: FUNDING_ACCOUNT_NUMBER.to_string(),
            contact_handle: None,
            balance: Decimal::ZERO,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let mut tx = self.begin().await?;
        let wallet = tx
            .lock_wallet(owner_id)
            .await?
            .ok_or_else(|| SettlementError::WalletNotFound(owner_id.to_string()))?;

        let leg = NewLedgerEntry::transfer_in(Uuid::new_v4(), &wallet, &funding, amount, "Wallet top-up")?;
        tx.update_balance(owner_id, leg.balance_after).await?;
        let entry = tx.append(leg).await?;
        tx.commit().await?;
        Ok(entry)
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        Ok(Box::new(MemoryLedgerTx {
            state: self.state.clone(),
            lock_timeout: self.lock_timeout,
            lock_trace: self.lock_trace.clone(),
            guards: HashMap::new(),
            staged: HashMap::new(),
            pending: Vec::new(),
        }))
    }

    async fn get_wallet(&self, owner_id: &str) -> AppResult<Option<Wallet>> {
        Ok(self.state.lock().rows.get(owner_id).map(|row| row.wallet.clone()))
    }

    async fn insert_wallet(
        &self,
        owner_id: &str,
        account_number: &str,
        contact_handle: Option<&str>,
    ) -> AppResult<Option<Wallet>> {
        let mut state = self.state.lock();
        if state.rows.contains_key(owner_id) || state.account_numbers.contains(account_number) {
            return Ok(None);
        }

        let now = Utc::now();
        let wallet = Wallet {
            owner_id: owner_id.to_string(),
            account_number: account_number.to_string(),
            contact_handle: contact_handle.map(str::to_string),
            balance: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        };

        state.account_numbers.insert(account_number.to_string());
        state.rows.insert(
            owner_id.to_string(),
            Row {
                lock: Arc::new(RowLock::new(())),
                wallet: wallet.clone(),
            },
        );
        Ok(Some(wallet))
    }

    async fn get_entry(&self, id: Uuid) -> AppResult<Option<LedgerEntry>> {
        Ok(self.state.lock().journal.iter().find(|e| e.id == id).cloned())
    }

    async fn entries_for_owner(&self, owner_id: &str) -> AppResult<Vec<LedgerEntry>> {
        let state = self.state.lock();
        Ok(state
            .journal
            .iter()
            .filter(|e| e.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn recent_entries(&self, owner_id: &str, limit: usize) -> AppResult<Vec<LedgerEntry>> {
        let state = self.state.lock();
        Ok(state
            .journal
            .iter()
            .rev()
            .filter(|e| e.owner_id == owner_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn purchase_legs_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<LedgerEntry>> {
        let state = self.state.lock();
        Ok(state
            .journal
            .iter()
            .filter(|e| e.purchase.is_some() && e.created_at >= from && e.created_at < to)
            .cloned()
            .collect())
    }
}

struct MemoryLedgerTx {
    state: Arc<Mutex<State>>,
    lock_timeout: Duration,
    lock_trace: Arc<Mutex<Vec<String>>>,
    guards: HashMap<String, OwnedMutexGuard<()>>,
    staged: HashMap<String, Wallet>,
    pending: Vec<LedgerEntry>,
}

impl MemoryLedgerTx {
    fn current(&self, owner_id: &str) -> Option<Wallet> {
        self.staged
            .get(owner_id)
            .cloned()
            .or_else(|| self.state.lock().rows.get(owner_id).map(|r| r.wallet.clone()))
    }
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    async fn lock_wallet(&mut self, owner_id: &str) -> AppResult<Option<Wallet>> {
        if self.guards.contains_key(owner_id) {
            return Ok(self.current(owner_id));
        }

        let lock = match self.state.lock().rows.get(owner_id) {
            Some(row) => row.lock.clone(),
            None => return Ok(None),
        };

        let guard = tokio::time::timeout(self.lock_timeout, lock.lock_owned())
            .await
            .map_err(|_| SettlementError::LockTimeout)?;

        self.lock_trace.lock().push(owner_id.to_string());
        self.guards.insert(owner_id.to_string(), guard);

        // Re-read after the lock is granted: this is the authoritative value
        Ok(self.current(owner_id))
    }

    async fn update_balance(&mut self, owner_id: &str, balance: Decimal) -> AppResult<Wallet> {
        if !self.guards.contains_key(owner_id) {
            return Err(AppError::Internal(format!(
                "Balance update on unlocked wallet {}",
                owner_id
            )));
        }
        if balance < Decimal::ZERO {
            return Err(AppError::Internal(format!(
                "Refusing negative balance {} for wallet {}",
                balance, owner_id
            )));
        }

        let mut wallet = self
            .current(owner_id)
            .ok_or_else(|| SettlementError::WalletNotFound(owner_id.to_string()))?;
        wallet.balance = balance;
        wallet.updated_at = Utc::now();
        self.staged.insert(owner_id.to_string(), wallet.clone());
        Ok(wallet)
    }

    async fn append(&mut self, entry: NewLedgerEntry) -> AppResult<LedgerEntry> {
        let entry = entry.into_entry(Uuid::new_v4(), Utc::now());
        self.pending.push(entry.clone());
        Ok(entry)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryLedgerTx {
            state,
            guards,
            staged,
            pending,
            ..
        } = *self;

        {
            let mut state = state.lock();
            for (owner_id, wallet) in staged {
                if let Some(row) = state.rows.get_mut(&owner_id) {
                    row.wallet = wallet;
                }
            }
            state.journal.extend(pending);
        }

        // Row locks are released only after the writes are visible
        drop(guards);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    async fn store_with(owner: &str, balance: Decimal) -> MemoryLedgerStore {
        let store = MemoryLedgerStore::new(Duration::from_millis(200));
        store.insert_wallet(owner, "ACC-1", None).await.unwrap();
        if balance > Decimal::ZERO {
            store.deposit(owner, balance).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_insert_wallet_is_unique_on_owner_and_account_number() {
        let store = MemoryLedgerStore::new(Duration::from_millis(50));

        assert!(store.insert_wallet("a", "ACC-1", None).await.unwrap().is_some());
        assert!(store.insert_wallet("a", "ACC-2", None).await.unwrap().is_none());
        assert!(store.insert_wallet("b", "ACC-1", None).await.unwrap().is_none());
        assert!(store.insert_wallet("b", "ACC-2", None).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_invisible_and_discarded_on_drop() {
        let store = store_with("payer", dec!(10.000)).await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.lock_wallet("payer").await.unwrap().unwrap();
            tx.update_balance("payer", dec!(0)).await.unwrap();

            // Unlocked reads still see the committed value
            let seen = store.get_wallet("payer").await.unwrap().unwrap();
            assert_eq!(seen.balance, dec!(10.000));
            // tx dropped here without commit
        }

        let wallet = store.get_wallet("payer").await.unwrap().unwrap();
        assert_eq!(wallet.balance, dec!(10.000));
        assert_eq!(store.journal().len(), 1);
    }

    #[tokio::test]
    async fn test_second_locker_times_out() {
        let store = store_with("payer", dec!(1)).await;

        let mut holder = store.begin().await.unwrap();
        holder.lock_wallet("payer").await.unwrap();

        let mut waiter = store.begin().await.unwrap();
        let err = waiter.lock_wallet("payer").await.unwrap_err();
        assert!(matches!(err, AppError::Settlement(SettlementError::LockTimeout)));

        holder.rollback().await.unwrap();
        assert!(waiter.lock_wallet("payer").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_requires_lock() {
        let store = store_with("payer", dec!(1)).await;
        let mut tx = store.begin().await.unwrap();
        assert!(tx.update_balance("payer", dec!(2)).await.is_err());
    }

    #[tokio::test]
    async fn test_lock_on_missing_wallet_returns_none() {
        let store = MemoryLedgerStore::new(Duration::from_millis(50));
        let mut tx = store.begin().await.unwrap();
        assert!(tx.lock_wallet("ghost").await.unwrap().is_none());
    }
}
