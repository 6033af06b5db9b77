use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json, Type};
use std::fmt;
use uuid::Uuid;

use crate::catalog::Product;

/// Direction of a ledger leg relative to its owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "wallet_transaction_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    TransferOut,
    TransferIn,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::TransferOut => "transfer_out",
            EntryType::TransferIn => "transfer_in",
        }
    }

    /// Apply this leg's amount to a running balance
    pub fn apply(&self, balance: Decimal, amount: Decimal) -> Decimal {
        match self {
            EntryType::TransferOut => balance - amount,
            EntryType::TransferIn => balance + amount,
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Wallet entity - one per account owner, the treasury included
///
/// INVARIANT: balance >= 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Wallet {
    pub owner_id: String,
    pub account_number: String,
    pub contact_handle: Option<String>,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Point-in-time balance view used for non-authoritative pre-checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceView {
    pub owner_id: String,
    pub account_number: String,
    pub balance: Decimal,
    pub available_balance: Decimal,
}

impl Wallet {
    /// Funds reserved by outstanding holds. The settlement path places none.
    pub fn held(&self) -> Decimal {
        Decimal::ZERO
    }

    pub fn available(&self) -> Decimal {
        self.balance - self.held()
    }

    pub fn balance_view(&self) -> BalanceView {
        BalanceView {
            owner_id: self.owner_id.clone(),
            account_number: self.account_number.clone(),
            balance: self.balance,
            available_balance: self.available(),
        }
    }
}

/// Ledger leg - one account's immutable side of a balance movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub transfer_id: Uuid,
    pub owner_id: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub counterparty_owner_id: String,
    pub counterparty_account_number: String,
    pub description: String,
    /// Items bought with this transfer, present on settlement debit legs
    pub purchase: Option<Json<Vec<Product>>>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Amount signed from the owner's point of view
    pub fn signed_amount(&self) -> Decimal {
        match self.entry_type {
            EntryType::TransferOut => -self.amount,
            EntryType::TransferIn => self.amount,
        }
    }

    /// Whether the leg's own arithmetic holds
    pub fn is_consistent(&self) -> bool {
        self.amount > Decimal::ZERO
            && self.balance_after >= Decimal::ZERO
            && self.entry_type.apply(self.balance_before, self.amount) == self.balance_after
    }

    pub fn purchased_items(&self) -> Option<&[Product]> {
        self.purchase.as_ref().map(|items| items.0.as_slice())
    }
}
