use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{types::Json, PgPool, Postgres, Transaction};
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::journal::NewLedgerEntry;
use super::models::*;
use super::store::{LedgerStore, LedgerTx};
use crate::error::{AppError, AppResult};

const WALLET_COLUMNS: &str =
    "owner_id, account_number, contact_handle, balance, created_at, updated_at";

const ENTRY_COLUMNS: &str = r#"id, transfer_id, owner_id, "type", amount, balance_before, balance_after,
    counterparty_owner_id, counterparty_account_number, description, purchase, created_at"#;

/// Ledger repository - THE source of truth for balances and legs
pub struct LedgerRepository {
    pub pool: PgPool,
    lock_timeout: Duration,
}

impl LedgerRepository {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }
}

#[async_trait]
impl LedgerStore for LedgerRepository {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        let mut tx = self.pool.begin().await?;

        // Bound every row-lock wait in this transaction
        let millis = self.lock_timeout.as_millis().max(1);
        sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", millis))
            .execute(&mut *tx)
            .await?;

        Ok(Box::new(PgLedgerTx {
            tx,
            locked: HashSet::new(),
        }))
    }

    async fn get_wallet(&self, owner_id: &str) -> AppResult<Option<Wallet>> {
        let wallet = sqlx::query_as::<_, Wallet>(&format!(
            "SELECT {} FROM wallets WHERE owner_id = $1",
            WALLET_COLUMNS
        ))
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(wallet)
    }

    async fn insert_wallet(
        &self,
        owner_id: &str,
        account_number: &str,
        contact_handle: Option<&str>,
    ) -> AppResult<Option<Wallet>> {
        // No conflict target: a clash on either owner_id or account_number
        // is reported as None and resolved by the caller.
        let wallet = sqlx::query_as::<_, Wallet>(&format!(
            r#"
            INSERT INTO wallets (owner_id, account_number, contact_handle, balance)
            VALUES ($1, $2, $3, 0)
            ON CONFLICT DO NOTHING
            RETURNING {}
            "#,
            WALLET_COLUMNS
        ))
        .bind(owner_id)
        .bind(account_number)
        .bind(contact_handle)
        .fetch_optional(&self.pool)
        .await?;

        Ok(wallet)
    }

    async fn get_entry(&self, id: Uuid) -> AppResult<Option<LedgerEntry>> {
        let entry = sqlx::query_as::<_, LedgerEntry>(&format!(
            "SELECT {} FROM wallet_transactions WHERE id = $1",
            ENTRY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    async fn entries_for_owner(&self, owner_id: &str) -> AppResult<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
            "SELECT {} FROM wallet_transactions WHERE owner_id = $1 ORDER BY created_at ASC, seq ASC",
            ENTRY_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn recent_entries(&self, owner_id: &str, limit: usize) -> AppResult<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"
            SELECT {} FROM wallet_transactions
            WHERE owner_id = $1
            ORDER BY created_at DESC, seq DESC
            LIMIT $2
            "#,
            ENTRY_COLUMNS
        ))
        .bind(owner_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn purchase_legs_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"
            SELECT {} FROM wallet_transactions
            WHERE "type" = $1
              AND purchase IS NOT NULL
              AND created_at >= $2 AND created_at < $3
            ORDER BY created_at ASC
            "#,
            ENTRY_COLUMNS
        ))
        .bind(EntryType::TransferOut)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

/// A PostgreSQL transaction holding `FOR UPDATE` locks on wallet rows
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
    locked: HashSet<String>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn lock_wallet(&mut self, owner_id: &str) -> AppResult<Option<Wallet>> {
        let wallet = sqlx::query_as::<_, Wallet>(&format!(
            "SELECT {} FROM wallets WHERE owner_id = $1 FOR UPDATE",
            WALLET_COLUMNS
        ))
        .bind(owner_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        if wallet.is_some() {
            debug!("🔒 Locked wallet row {}", owner_id);
            self.locked.insert(owner_id.to_string());
        }
        Ok(wallet)
    }

    async fn update_balance(&mut self, owner_id: &str, balance: Decimal) -> AppResult<Wallet> {
        if !self.locked.contains(owner_id) {
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

        let wallet = sqlx::query_as::<_, Wallet>(&format!(
            r#"
            UPDATE wallets
            SET balance = $2, updated_at = NOW()
            WHERE owner_id = $1
            RETURNING {}
            "#,
            WALLET_COLUMNS
        ))
        .bind(owner_id)
        .bind(balance)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(wallet)
    }

    async fn append(&mut self, entry: NewLedgerEntry) -> AppResult<LedgerEntry> {
        // clock_timestamp() rather than NOW(): legs of one wallet must sort in
        // lock-acquisition order, not transaction-start order.
        let inserted = sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"
            INSERT INTO wallet_transactions (
                transfer_id, owner_id, "type", amount, balance_before, balance_after,
                counterparty_owner_id, counterparty_account_number, description, purchase,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, clock_timestamp())
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        ))
        .bind(entry.transfer_id)
        .bind(&entry.owner_id)
        .bind(entry.entry_type)
        .bind(entry.amount)
        .bind(entry.balance_before)
        .bind(entry.balance_after)
        .bind(&entry.counterparty_owner_id)
        .bind(&entry.counterparty_account_number)
        .bind(&entry.description)
        .bind(entry.purchase.map(Json))
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(inserted)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let this = *self;
        this.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        let this = *self;
        this.tx.rollback().await?;
        Ok(())
    }
}
