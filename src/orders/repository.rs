use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use super::models::*;
use super::{OrderLedger, ORDER_NUMBER_ATTEMPTS};
use crate::error::{AppError, AppResult};

const ORDER_COLUMNS: &str = "id, order_number, user_id, items, payment_method, settlement_ledger_id, \
    subtotal, total, currency, status, activation_attempts, last_attempt_at, created_at, updated_at";

pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderLedger for OrderRepository {
    async fn create_order(&self, order: NewOrder) -> AppResult<Order> {
        let subtotal = order.subtotal();

        for attempt in 1..=ORDER_NUMBER_ATTEMPTS {
            let order_number = generate_order_number(Utc::now());

            let created = sqlx::query_as::<_, Order>(&format!(
                r#"
                INSERT INTO orders (
                    order_number, user_id, items, payment_method, settlement_ledger_id,
                    subtotal, total, currency, status
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT DO NOTHING
                RETURNING {}
                "#,
                ORDER_COLUMNS
            ))
            .bind(&order_number)
            .bind(&order.user_id)
            .bind(Json(&order.items))
            .bind(order.payment_method)
            .bind(order.settlement_ledger_id)
            .bind(subtotal)
            .bind(subtotal)
            .bind(&order.currency)
            .bind(OrderStatus::Paid)
            .fetch_optional(&self.pool)
            .await?;

            if let Some(created) = created {
                info!("🧾 Order {} created for user {}", created.order_number, created.user_id);
                return Ok(created);
            }

            // Either the settlement already has its order, or the number clashed
            if let Some(existing) = self.find_by_settlement(order.settlement_ledger_id).await? {
                return Ok(existing);
            }

            warn!("Order number {} taken (attempt {}), retrying", order_number, attempt);
        }

        Err(AppError::Internal(
            "Could not allocate a unique order number".to_string(),
        ))
    }

    async fn find_by_settlement(&self, settlement_ledger_id: Uuid) -> AppResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE settlement_ledger_id = $1",
            ORDER_COLUMNS
        ))
        .bind(settlement_ledger_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    async fn mark_fulfilled(&self, order_id: Uuid) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = $3
            "#,
        )
        .bind(order_id)
        .bind(OrderStatus::Fulfilled)
        .bind(OrderStatus::Paid)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_attempt(&self, order_id: Uuid) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE orders
            SET activation_attempts = activation_attempts + 1,
                last_attempt_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_unfulfilled(&self, before: DateTime<Utc>, limit: usize) -> AppResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            r#"
            SELECT {} FROM orders
            WHERE status = $1 AND created_at < $2
            ORDER BY last_attempt_at ASC NULLS FIRST, created_at ASC
            LIMIT $3
            "#,
            ORDER_COLUMNS
        ))
        .bind(OrderStatus::Paid)
        .bind(before)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }
}
