use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::ledger::models::{EntryType, LedgerEntry};

/// Checkout request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(length(min = 1, max = 50, message = "between 1 and 50 products required"))]
    pub slugs: Vec<String>,
    /// Must match the wallet currency when present
    #[validate(length(equal = 3, message = "ISO 4217 code expected"))]
    pub currency: Option<String>,
}

/// Checkout response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    /// Null when the payment committed but the order is still being written
    pub order_id: Option<Uuid>,
    pub order_number: Option<String>,
    pub transfer_id: Uuid,
    /// Slugs whose entitlement was activated
    pub activated: Vec<String>,
    pub total: Decimal,
    pub currency: String,
    pub new_balance: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// One ledger leg as shown to its owner
#[derive(Debug, Serialize)]
pub struct TransactionView {
    pub id: Uuid,
    pub transfer_id: Uuid,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub amount: Decimal,
    pub signed_amount: Decimal,
    pub balance_after: Decimal,
    pub counterparty_account_number: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl From<LedgerEntry> for TransactionView {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id,
            transfer_id: entry.transfer_id,
            signed_amount: entry.signed_amount(),
            entry_type: entry.entry_type,
            amount: entry.amount,
            balance_after: entry.balance_after,
            counterparty_account_number: entry.counterparty_account_number,
            description: entry.description,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionHistoryResponse {
    pub owner_id: String,
    pub transactions: Vec<TransactionView>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}
