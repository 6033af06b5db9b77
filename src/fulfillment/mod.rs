// Post-commit collaborators: entitlement activation and user notification.
//
// Both run after the money has moved. Neither may roll back a settlement.

#[cfg(test)]
pub mod memory;
pub mod notifications;
pub mod subscriptions;

#[cfg(test)]
pub use memory::{InMemoryActivator, InMemoryNotifier};
pub use notifications::NotificationOutbox;
pub use subscriptions::SubscriptionRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::catalog::Product;
use crate::error::AppResult;
use crate::orders::PaymentMethod;

/// Entitlement granted for one purchased product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: String,
    pub product_id: Uuid,
    pub product_slug: String,
    pub program: String,
    pub payment_id: Uuid,
    pub payment_method: PaymentMethod,
    pub amount: Decimal,
    pub currency: String,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Everything an activator needs to grant one item
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationRequest {
    pub user_id: String,
    pub product_id: Uuid,
    pub product_slug: String,
    pub program: String,
    pub duration_days: i32,
    /// Idempotency key together with `user_id` and `product_id`
    pub payment_id: Uuid,
    pub payment_method: PaymentMethod,
    pub amount: Decimal,
    pub currency: String,
}

impl ActivationRequest {
    pub fn for_product(
        user_id: &str,
        product: &Product,
        payment_id: Uuid,
        payment_method: PaymentMethod,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            product_id: product.id,
            product_slug: product.slug.clone(),
            program: product.program.clone(),
            duration_days: product.duration_days,
            payment_id,
            payment_method,
            amount: product.price_amount,
            currency: product.currency.clone(),
        }
    }
}

#[async_trait]
pub trait SubscriptionActivator: Send + Sync {
    /// Grant the entitlement. Repeating a call with the same
    /// `(user_id, product_id, payment_id)` returns the original grant.
    async fn activate(&self, request: ActivationRequest) -> AppResult<Subscription>;
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Fire-and-forget. Callers log and ignore errors.
    async fn notify(&self, user_id: &str, message: &str) -> AppResult<()>;
}
