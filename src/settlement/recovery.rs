// Settlement recovery - finishes settlements interrupted after commit
//
// Two cases are re-driven:
// - a committed purchase leg with no order (crash between commit and order insert)
// - an order still `paid` because one or more activations failed
//
// Both paths are idempotent, so overlapping sweeps are harmless.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::engine::SettlementEngine;
use crate::error::AppResult;
use crate::ledger::store::LedgerStore;
use crate::orders::OrderLedger;

#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Settlements younger than this are left to the request still handling them
    pub grace: Duration,
    /// How far back to look for legs without an order
    pub lookback: Duration,
    /// Unfulfilled orders re-driven per sweep, least recently attempted first
    pub batch_size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    pub orders_created: usize,
    pub orders_fulfilled: usize,
    pub still_pending: usize,
    pub failures: usize,
}

pub struct SettlementRecovery {
    engine: Arc<SettlementEngine>,
    store: Arc<dyn LedgerStore>,
    orders: Arc<dyn OrderLedger>,
    config: RecoveryConfig,
}

impl SettlementRecovery {
    pub fn new(
        engine: Arc<SettlementEngine>,
        store: Arc<dyn LedgerStore>,
        orders: Arc<dyn OrderLedger>,
        config: RecoveryConfig,
    ) -> Self {
        Self {
            engine,
            store,
            orders,
            config,
        }
    }

    pub async fn sweep(&self) -> AppResult<RecoveryReport> {
        self.sweep_at(Utc::now()).await
    }

    pub async fn sweep_at(&self, now: DateTime<Utc>) -> AppResult<RecoveryReport> {
        let cutoff = now - self.config.grace;
        let mut report = RecoveryReport::default();

        let legs = self
            .store
            .purchase_legs_between(now - self.config.lookback, cutoff)
            .await?;

        for leg in legs {
            if self.orders.find_by_settlement(leg.id).await?.is_some() {
                continue;
            }

            let Some(products) = leg.purchased_items() else {
                continue;
            };
            let products = products.to_vec();

            warn!("🔁 Transfer {} has no order, re-driving", leg.transfer_id);
            match self.engine.fulfill(&leg.owner_id, &leg, &products).await {
                Ok(fulfillment) => {
                    report.orders_created += 1;
                    if fulfillment.fulfilled {
                        report.orders_fulfilled += 1;
                    } else {
                        report.still_pending += 1;
                    }
                    self.engine
                        .notify_purchase(&leg.owner_id, &fulfillment.order, leg.balance_after)
                        .await;
                }
                Err(e) => {
                    error!("❌ Recovery of transfer {} failed: {:?}", leg.transfer_id, e);
                    report.failures += 1;
                }
            }
        }

        let unfulfilled = self.orders.list_unfulfilled(cutoff, self.config.batch_size).await?;
        for order in unfulfilled {
            let Some(leg) = self.store.get_entry(order.settlement_ledger_id).await? else {
                error!(
                    "❌ Order {} references missing ledger leg {}",
                    order.order_number, order.settlement_ledger_id
                );
                report.failures += 1;
                continue;
            };
            let Some(products) = leg.purchased_items() else {
                report.failures += 1;
                continue;
            };
            let products = products.to_vec();

            match self.engine.activate_order(&order, &products, leg.transfer_id).await {
                Ok(fulfillment) if fulfillment.fulfilled => report.orders_fulfilled += 1,
                Ok(_) => report.still_pending += 1,
                Err(e) => {
                    error!("❌ Re-activation of order {} failed: {:?}", order.order_number, e);
                    report.failures += 1;
                }
            }
        }

        if report != RecoveryReport::default() {
            info!(
                "✓ Recovery sweep: {} created, {} fulfilled, {} pending, {} failed",
                report.orders_created, report.orders_fulfilled, report.still_pending, report.failures
            );
        }
        Ok(report)
    }
}
