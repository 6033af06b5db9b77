use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json, Type};
use uuid::Uuid;

use crate::catalog::Product;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Funds settled, entitlements not yet all granted
    Paid,
    /// Every item activated
    Fulfilled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "payment_method", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Wallet,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Wallet => "wallet",
        }
    }
}

/// Product snapshot taken at purchase time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub slug: String,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub currency: String,
}

impl From<&Product> for OrderItem {
    fn from(product: &Product) -> Self {
        Self {
            product_id: product.id,
            slug: product.slug.clone(),
            name: product.name.clone(),
            quantity: 1,
            unit_price: product.price_amount,
            currency: product.currency.clone(),
        }
    }
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Purchase receipt for one settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: String,
    pub items: Json<Vec<OrderItem>>,
    pub payment_method: PaymentMethod,
    /// The payer's transfer_out leg
    pub settlement_ledger_id: Uuid,
    pub subtotal: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub status: OrderStatus,
    /// Activation passes that left the order `paid`
    pub activation_attempts: i32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`super::OrderLedger::create_order`]
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub user_id: String,
    pub items: Vec<OrderItem>,
    pub payment_method: PaymentMethod,
    pub settlement_ledger_id: Uuid,
    pub currency: String,
    /// Native decimal places of `currency`
    pub currency_scale: u32,
}

impl NewOrder {
    pub fn subtotal(&self) -> Decimal {
        let mut subtotal: Decimal = self.items.iter().map(OrderItem::line_total).sum();
        subtotal.rescale(self.currency_scale);
        subtotal
    }
}

const ORDER_NUMBER_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Human-shareable order number, e.g. `ORD-20240101-7KQ2MX`
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..6)
        .map(|_| ORDER_NUMBER_ALPHABET[rng.random_range(0..ORDER_NUMBER_ALPHABET.len())] as char)
        .collect();
    format!("ORD-{}-{}", now.format("%Y%m%d"), suffix)
}
