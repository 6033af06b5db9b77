// Product catalog - read-only boundary of the settlement engine

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, PgPool};
use uuid::Uuid;

use crate::error::AppResult;

/// Purchasable product, as snapshotted onto ledger legs and orders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub program: String,
    pub plan: String,
    pub duration_days: i32,
    pub price_amount: Decimal,
    pub currency: String,
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Active products matching `slugs`. Unknown slugs are simply absent.
    async fn find_by_slugs(&self, slugs: &[String]) -> AppResult<Vec<Product>>;
}

pub struct ProductRepository {
    pool: PgPool,
}

impl ProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductCatalog for ProductRepository {
    async fn find_by_slugs(&self, slugs: &[String]) -> AppResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, slug, name, program, plan, duration_days, price_amount, currency
            FROM products
            WHERE slug = ANY($1) AND active
            "#,
        )
        .bind(slugs)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }
}

#[cfg(test)]
pub use memory::InMemoryCatalog;
