use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::PgPool;
use tracing::info;

use super::{ActivationRequest, Subscription, SubscriptionActivator};
use crate::error::AppResult;

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, product_id, product_slug, program, payment_id, \
    payment_method, amount, currency, starts_at, expires_at, created_at";

pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionActivator for SubscriptionRepository {
    async fn activate(&self, request: ActivationRequest) -> AppResult<Subscription> {
        let starts_at = Utc::now();
        let expires_at = starts_at + Duration::days(i64::from(request.duration_days));

        let created = sqlx::query_as::<_, Subscription>(&format!(
            r#"
            INSERT INTO subscriptions (
                user_id, product_id, product_slug, program, payment_id, payment_method,
                amount, currency, starts_at, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (user_id, product_id, payment_id) DO NOTHING
            RETURNING {}
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(&request.user_id)
        .bind(request.product_id)
        .bind(&request.product_slug)
        .bind(&request.program)
        .bind(request.payment_id)
        .bind(request.payment_method)
        .bind(request.amount)
        .bind(&request.currency)
        .bind(starts_at)
        .bind(expires_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(subscription) = created {
            info!(
                "🎟️  Activated {} for user {} (payment {})",
                subscription.product_slug, subscription.user_id, subscription.payment_id
            );
            return Ok(subscription);
        }

        let existing = sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {} FROM subscriptions WHERE user_id = $1 AND product_id = $2 AND payment_id = $3",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(&request.user_id)
        .bind(request.product_id)
        .bind(request.payment_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(existing)
    }
}
