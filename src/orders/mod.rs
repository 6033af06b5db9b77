pub mod models;
pub mod repository;

#[cfg(test)]
pub use memory::InMemoryOrderLedger;
pub use models::{NewOrder, Order, OrderItem, OrderStatus, PaymentMethod};
pub use repository::OrderRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppResult;

/// Attempts at finding a free order number before giving up
pub(crate) const ORDER_NUMBER_ATTEMPTS: usize = 5;

/// Purchase receipts, one per settlement
#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Create the order for a settlement. Idempotent on
    /// `settlement_ledger_id`: a second call returns the existing order.
    async fn create_order(&self, order: NewOrder) -> AppResult<Order>;

    async fn find_by_settlement(&self, settlement_ledger_id: Uuid) -> AppResult<Option<Order>>;

    async fn mark_fulfilled(&self, order_id: Uuid) -> AppResult<()>;

    /// Note an activation pass that left the order `paid`
    async fn record_attempt(&self, order_id: Uuid) -> AppResult<()>;

    /// Orders still `paid` that were created before `before`, least
    /// recently attempted first so a stuck order cannot starve the rest
    async fn list_unfulfilled(&self, before: DateTime<Utc>, limit: usize) -> AppResult<Vec<Order>>;
}
