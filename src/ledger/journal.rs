//! Ledger leg construction and replay.
//!
//! Legs are only ever built here so that `balance_after` is always derived
//! from `balance_before` and the amount, never supplied by a caller.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::types::Json;
use uuid::Uuid;

use super::models::{EntryType, LedgerEntry, Wallet};
use crate::catalog::Product;
use crate::error::{AppError, AppResult};

/// A leg that has not been appended yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerEntry {
    pub transfer_id: Uuid,
    pub owner_id: String,
    pub entry_type: EntryType,
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub counterparty_owner_id: String,
    pub counterparty_account_number: String,
    pub description: String,
    pub purchase: Option<Vec<Product>>,
}

impl NewLedgerEntry {
    /// Debit leg for `owner`, paid to `counterparty`
    pub fn transfer_out(
        transfer_id: Uuid,
        owner: &Wallet,
        counterparty: &Wallet,
        amount: Decimal,
        description: impl Into<String>,
    ) -> AppResult<Self> {
        Self::build(transfer_id, EntryType::TransferOut, owner, counterparty, amount, description)
    }

    /// Credit leg for `owner`, received from `counterparty`
    pub fn transfer_in(
        transfer_id: Uuid,
        owner: &Wallet,
        counterparty: &Wallet,
        amount: Decimal,
        description: impl Into<String>,
    ) -> AppResult<Self> {
        Self::build(transfer_id, EntryType::TransferIn, owner, counterparty, amount, description)
    }

    fn build(
        transfer_id: Uuid,
        entry_type: EntryType,
        owner: &Wallet,
        counterparty: &Wallet,
        amount: Decimal,
        description: impl Into<String>,
    ) -> AppResult<Self> {
        if amount <= Decimal::ZERO {
            return Err(AppError::InvalidInput(format!(
                "Ledger amount must be positive, got {}",
                amount
            )));
        }

        let balance_after = entry_type.apply(owner.balance, amount);
        if balance_after < Decimal::ZERO {
            return Err(AppError::Internal(format!(
                "Leg would leave wallet {} negative ({})",
                owner.owner_id, balance_after
            )));
        }

        Ok(Self {
            transfer_id,
            owner_id: owner.owner_id.clone(),
            entry_type,
            amount,
            balance_before: owner.balance,
            balance_after,
            counterparty_owner_id: counterparty.owner_id.clone(),
            counterparty_account_number: counterparty.account_number.clone(),
            description: description.into(),
            purchase: None,
        })
    }

    pub fn with_purchase(mut self, items: Vec<Product>) -> Self {
        self.purchase = Some(items);
        self
    }

    pub fn into_entry(self, id: Uuid, created_at: DateTime<Utc>) -> LedgerEntry {
        LedgerEntry {
            id,
            transfer_id: self.transfer_id,
            owner_id: self.owner_id,
            entry_type: self.entry_type,
            amount: self.amount,
            balance_before: self.balance_before,
            balance_after: self.balance_after,
            counterparty_owner_id: self.counterparty_owner_id,
            counterparty_account_number: self.counterparty_account_number,
            description: self.description,
            purchase: self.purchase.map(Json),
            created_at,
        }
    }
}

/// Result of replaying a wallet's legs against its stored balance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationReport {
    pub owner_id: String,
    pub stored_balance: Decimal,
    pub replayed_balance: Decimal,
    pub entry_count: usize,
    /// Legs whose own arithmetic is wrong or whose `balance_before` breaks the chain
    pub broken_legs: Vec<Uuid>,
    pub balanced: bool,
}

/// Sum legs in `created_at` order starting from zero
pub fn replay(entries: &[LedgerEntry]) -> Decimal {
    let mut ordered: Vec<&LedgerEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| e.created_at);
    ordered
        .into_iter()
        .fold(Decimal::ZERO, |balance, entry| balance + entry.signed_amount())
}

/// Compare a wallet's stored balance with the replay of its legs
pub fn reconcile(wallet: &Wallet, entries: &[LedgerEntry]) -> ReconciliationReport {
    let mut ordered: Vec<&LedgerEntry> = entries
        .iter()
        .filter(|e| e.owner_id == wallet.owner_id)
        .collect();
    ordered.sort_by_key(|e| e.created_at);

    let mut running = Decimal::ZERO;
    let mut broken_legs = Vec::new();
    for entry in &ordered {
        if !entry.is_consistent() || entry.balance_before != running {
            broken_legs.push(entry.id);
        }
        running += entry.signed_amount();
    }

    ReconciliationReport {
        owner_id: wallet.owner_id.clone(),
        stored_balance: wallet.balance,
        replayed_balance: running,
        entry_count: ordered.len(),
        balanced: broken_legs.is_empty() && running == wallet.balance,
        broken_legs,
    }
}
