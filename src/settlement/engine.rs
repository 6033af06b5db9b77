use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::catalog::{Product, ProductCatalog};
use crate::error::{AppError, AppResult, SettlementError};
use crate::fulfillment::{ActivationRequest, NotificationDispatcher, SubscriptionActivator};
use crate::ledger::{
    journal::NewLedgerEntry,
    models::LedgerEntry,
    store::{LedgerStore, LedgerTx},
};
use crate::orders::{NewOrder, Order, OrderItem, OrderLedger, PaymentMethod};
use crate::wallet::{TreasuryAccount, WalletService};

/// Wallet row lock acquisition order.
///
/// Every transaction touching more than one wallet locks rows in ascending
/// order of this enum. Because the treasury is always last, two settlements
/// can contend on it but never wait on each other in a cycle. New account
/// kinds must be appended at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LockOrder {
    Payer,
    Treasury,
}

/// Tracks the last lock taken in a transaction and refuses to go backwards
#[derive(Debug, Default)]
pub struct LockSequence {
    last: Option<LockOrder>,
}

impl LockSequence {
    pub fn advance(&mut self, next: LockOrder) -> AppResult<()> {
        if let Some(last) = self.last {
            if next <= last {
                return Err(AppError::Internal(format!(
                    "Lock order violation: {:?} requested after {:?}",
                    next, last
                )));
            }
        }
        self.last = Some(next);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SettlementConfig {
    /// Currency every wallet is held in
    pub currency: String,
    /// Native decimal places of `currency`
    pub currency_scale: u32,
}

/// A priced, validated basket
#[derive(Debug, Clone, PartialEq)]
pub struct Basket {
    pub products: Vec<Product>,
    pub total: Decimal,
    pub currency: String,
}

/// The two committed legs of one settlement
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeReceipt {
    pub transfer_id: Uuid,
    pub debit: LedgerEntry,
    pub credit: LedgerEntry,
}

/// Post-commit results for one settlement
#[derive(Debug, Clone, PartialEq)]
pub struct Fulfillment {
    pub order: Order,
    /// Slugs whose entitlement is in place
    pub activated: Vec<String>,
    pub fulfilled: bool,
}

/// Result of a committed settlement. `order_id` is `None` when the money
/// moved but the order could not be written yet; the recovery sweep
/// creates it from the debit leg.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementOutcome {
    pub order_id: Option<Uuid>,
    pub order_number: Option<String>,
    pub transfer_id: Uuid,
    pub settlement_ledger_id: Uuid,
    pub total_charged: Decimal,
    pub currency: String,
    pub new_balance: Decimal,
    pub activated: Vec<String>,
}

/// Settlement engine - moves purchase funds from a payer to the treasury
///
/// ARCHITECTURE: the money-moving part (`charge`) is one transaction holding
/// the payer and treasury row locks. Order creation, activation and
/// notification run after commit and are individually idempotent, so the
/// recovery sweep can re-drive them.
pub struct SettlementEngine {
    store: Arc<dyn LedgerStore>,
    wallets: Arc<WalletService>,
    treasury: TreasuryAccount,
    catalog: Arc<dyn ProductCatalog>,
    orders: Arc<dyn OrderLedger>,
    activator: Arc<dyn SubscriptionActivator>,
    notifier: Arc<dyn NotificationDispatcher>,
    config: SettlementConfig,
}

impl SettlementEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        wallets: Arc<WalletService>,
        treasury: TreasuryAccount,
        catalog: Arc<dyn ProductCatalog>,
        orders: Arc<dyn OrderLedger>,
        activator: Arc<dyn SubscriptionActivator>,
        notifier: Arc<dyn NotificationDispatcher>,
        config: SettlementConfig,
    ) -> Self {
        Self {
            store,
            wallets,
            treasury,
            catalog,
            orders,
            activator,
            notifier,
            config,
        }
    }

    pub fn currency(&self) -> &str {
        &self.config.currency
    }

    pub fn treasury(&self) -> &TreasuryAccount {
        &self.treasury
    }

    /// Buy every product in `slugs` with the payer's wallet
    pub async fn settle(&self, payer_id: &str, slugs: &[String]) -> AppResult<SettlementOutcome> {
        info!("💳 Settling {} item(s) for {}", slugs.len(), payer_id);

        if payer_id == self.treasury.owner_id() {
            return Err(AppError::InvalidInput(
                "The treasury cannot purchase from itself".to_string(),
            ));
        }

        let basket = self.price_basket(slugs).await?;
        self.precheck(payer_id, &basket).await?;

        let receipt = self.charge(payer_id, &basket).await?;

        // Money has moved: from here on the caller must see success, or a
        // retry would charge the basket a second time
        let mut outcome = SettlementOutcome {
            order_id: None,
            order_number: None,
            transfer_id: receipt.transfer_id,
            settlement_ledger_id: receipt.debit.id,
            total_charged: basket.total,
            currency: basket.currency,
            new_balance: receipt.debit.balance_after,
            activated: Vec::new(),
        };

        match self
            .fulfill(payer_id, &receipt.debit, &basket.products)
            .await
        {
            Ok(fulfillment) => {
                self.notify_purchase(payer_id, &fulfillment.order, receipt.debit.balance_after)
                    .await;
                outcome.order_id = Some(fulfillment.order.id);
                outcome.order_number = Some(fulfillment.order.order_number);
                outcome.activated = fulfillment.activated;
            }
            Err(e) => error!(
                "❌ Transfer {} committed but order creation failed, left for recovery: {:?}",
                receipt.transfer_id, e
            ),
        }

        Ok(outcome)
    }

    /// Resolve and validate the requested products. Performs no writes.
    pub async fn price_basket(&self, slugs: &[String]) -> AppResult<Basket> {
        if slugs.is_empty() {
            return Err(AppError::InvalidInput("At least one product is required".to_string()));
        }

        let mut seen = HashSet::new();
        for slug in slugs {
            if slug.trim().is_empty() {
                return Err(AppError::InvalidInput("Product slug cannot be empty".to_string()));
            }
            if !seen.insert(slug.as_str()) {
                return Err(AppError::InvalidInput(format!("Duplicate product: {}", slug)));
            }
        }

        let found = self.catalog.find_by_slugs(slugs).await?;

        let mut products = Vec::with_capacity(slugs.len());
        for slug in slugs {
            let product = found
                .iter()
                .find(|p| &p.slug == slug)
                .cloned()
                .ok_or_else(|| SettlementError::ProductNotFound { slug: slug.clone() })?;
            products.push(product);
        }

        let mut total = Decimal::ZERO;
        for product in &products {
            if !product.currency.eq_ignore_ascii_case(&self.config.currency) {
                return Err(AppError::InvalidInput(format!(
                    "Product {} is priced in {}, wallet currency is {}",
                    product.slug, product.currency, self.config.currency
                )));
            }
            if product.price_amount <= Decimal::ZERO {
                return Err(AppError::InvalidInput(format!(
                    "Product {} has no payable price",
                    product.slug
                )));
            }
            // Trailing zeros from NUMERIC round-trips are not extra precision
            if product.price_amount.normalize().scale() > self.config.currency_scale {
                return Err(AppError::InvalidInput(format!(
                    "Product {} price {} exceeds {} decimal places",
                    product.slug, product.price_amount, self.config.currency_scale
                )));
            }
            total += product.price_amount;
        }
        total.rescale(self.config.currency_scale);

        Ok(Basket {
            products,
            total,
            currency: self.config.currency.clone(),
        })
    }

    /// Fast, non-authoritative balance check that avoids opening a
    /// transaction for an obviously unaffordable basket.
    async fn precheck(&self, payer_id: &str, basket: &Basket) -> AppResult<()> {
        let view = self.wallets.get_available_balance(payer_id).await?;
        if view.available_balance < basket.total {
            debug!(
                "Fast check rejected {}: {} < {}",
                payer_id, view.available_balance, basket.total
            );
            return Err(SettlementError::InsufficientBalance {
                required: basket.total,
                available: view.available_balance,
            }
            .into());
        }
        Ok(())
    }

    /// Debit the payer and credit the treasury in one transaction
    pub async fn charge(&self, payer_id: &str, basket: &Basket) -> AppResult<ChargeReceipt> {
        let mut tx = self.store.begin().await?;

        match self.transfer(tx.as_mut(), payer_id, basket).await {
            Ok(receipt) => {
                tx.commit().await?;
                info!(
                    "✅ Transfer {} committed: {} {} from {} to treasury",
                    receipt.transfer_id, basket.total, basket.currency, payer_id
                );
                Ok(receipt)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Rollback after failed transfer also failed: {:?}", rollback_err);
                }
                Err(e)
            }
        }
    }

    async fn transfer(
        &self,
        tx: &mut dyn LedgerTx,
        payer_id: &str,
        basket: &Basket,
    ) -> AppResult<ChargeReceipt> {
        let mut locks = LockSequence::default();
        let total = basket.total;

        locks.advance(LockOrder::Payer)?;
        let payer = tx
            .lock_wallet(payer_id)
            .await?
            .ok_or_else(|| SettlementError::WalletNotFound(payer_id.to_string()))?;

        // Authoritative check, made under the payer's row lock
        if payer.balance < total {
            warn!(
                "Insufficient balance for {}: required {}, available {}",
                payer_id, total, payer.balance
            );
            return Err(SettlementError::InsufficientBalance {
                required: total,
                available: payer.balance,
            }
            .into());
        }

        locks.advance(LockOrder::Treasury)?;
        let treasury = tx
            .lock_wallet(self.treasury.owner_id())
            .await?
            .ok_or_else(|| SettlementError::TreasuryNotFound(self.treasury.owner_id().to_string()))?;

        let transfer_id = Uuid::new_v4();
        let description = purchase_description(&basket.products);

        let debit = NewLedgerEntry::transfer_out(transfer_id, &payer, &treasury, total, &description)?
            .with_purchase(basket.products.clone());
        tx.update_balance(&payer.owner_id, debit.balance_after).await?;
        let debit = tx.append(debit).await?;

        let credit = NewLedgerEntry::transfer_in(transfer_id, &treasury, &payer, total, &description)?;
        tx.update_balance(&treasury.owner_id, credit.balance_after).await?;
        let credit = tx.append(credit).await?;

        Ok(ChargeReceipt {
            transfer_id,
            debit,
            credit,
        })
    }

    /// Create the order for a committed debit leg and activate its items.
    /// Idempotent: safe to call again for the same leg.
    pub async fn fulfill(
        &self,
        payer_id: &str,
        debit: &LedgerEntry,
        products: &[Product],
    ) -> AppResult<Fulfillment> {
        let order = self
            .orders
            .create_order(NewOrder {
                user_id: payer_id.to_string(),
                items: products.iter().map(OrderItem::from).collect(),
                payment_method: PaymentMethod::Wallet,
                settlement_ledger_id: debit.id,
                currency: self.config.currency.clone(),
                currency_scale: self.config.currency_scale,
            })
            .await?;

        self.activate_order(&order, products, debit.transfer_id).await
    }

    /// Activate every item of an order, keyed on the transfer id. Failures
    /// are logged and leave the order `paid` for the next sweep.
    pub async fn activate_order(
        &self,
        order: &Order,
        products: &[Product],
        payment_id: Uuid,
    ) -> AppResult<Fulfillment> {
        let mut activated = Vec::with_capacity(products.len());

        for product in products {
            let request = ActivationRequest::for_product(
                &order.user_id,
                product,
                payment_id,
                order.payment_method,
            );
            match self.activator.activate(request).await {
                Ok(subscription) => {
                    debug!("Activated {} as {}", product.slug, subscription.id);
                    activated.push(product.slug.clone());
                }
                Err(e) => error!(
                    "❌ Activation of {} for order {} failed: {:?}",
                    product.slug, order.order_number, e
                ),
            }
        }

        let fulfilled = activated.len() == products.len();
        if fulfilled {
            if let Err(e) = self.orders.mark_fulfilled(order.id).await {
                warn!("Could not mark order {} fulfilled: {:?}", order.order_number, e);
            }
        } else if let Err(e) = self.orders.record_attempt(order.id).await {
            warn!("Could not record attempt on order {}: {:?}", order.order_number, e);
        }

        Ok(Fulfillment {
            order: order.clone(),
            activated,
            fulfilled,
        })
    }

    /// Best effort. Never fails the caller.
    pub async fn notify_purchase(&self, user_id: &str, order: &Order, new_balance: Decimal) {
        let message = format!(
            "Payment of {} {} received for order {}. Wallet balance: {} {}.",
            order.total, order.currency, order.order_number, new_balance, order.currency
        );

        if let Err(e) = self.notifier.notify(user_id, &message).await {
            warn!("⚠️ Notification for order {} not sent: {:?}", order.order_number, e);
        }
    }
}

fn purchase_description(products: &[Product]) -> String {
    let slugs: Vec<&str> = products.iter().map(|p| p.slug.as_str()).collect();
    format!("Purchase: {}", slugs.join(", "))
}
