// In-memory activator and notifier for exercising the engine's post-commit paths

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::{ActivationRequest, NotificationDispatcher, Subscription, SubscriptionActivator};
use crate::error::{AppError, AppResult};

type ActivationKey = (String, Uuid, Uuid);

/// Activator held in memory. Slugs listed in `failing` are refused, which
/// lets tests exercise post-commit failure handling.
#[derive(Default)]
pub struct InMemoryActivator {
    grants: Mutex<HashMap<ActivationKey, Subscription>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<usize>,
}

impl InMemoryActivator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, slug: &str) {
        self.failing.lock().insert(slug.to_string());
    }

    pub fn recover(&self, slug: &str) {
        self.failing.lock().remove(slug);
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.grants.lock().values().cloned().collect()
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl SubscriptionActivator for InMemoryActivator {
    async fn activate(&self, request: ActivationRequest) -> AppResult<Subscription> {
        *self.calls.lock() += 1;

        if self.failing.lock().contains(&request.product_slug) {
            return Err(AppError::Internal(format!(
                "activation unavailable for {}",
                request.product_slug
            )));
        }

        let key = (request.user_id.clone(), request.product_id, request.payment_id);
        let mut grants = self.grants.lock();
        let subscription = grants.entry(key).or_insert_with(|| {
            let starts_at = Utc::now();
            Subscription {
                id: Uuid::new_v4(),
                user_id: request.user_id.clone(),
                product_id: request.product_id,
                product_slug: request.product_slug.clone(),
                program: request.program.clone(),
                payment_id: request.payment_id,
                payment_method: request.payment_method,
                amount: request.amount,
                currency: request.currency.clone(),
                starts_at,
                expires_at: starts_at + Duration::days(i64::from(request.duration_days)),
                created_at: starts_at,
            }
        });

        Ok(subscription.clone())
    }
}

/// Collects messages in memory; can be switched to fail every call
#[derive(Default)]
pub struct InMemoryNotifier {
    sent: Mutex<Vec<(String, String)>>,
    failing: Mutex<bool>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl NotificationDispatcher for InMemoryNotifier {
    async fn notify(&self, user_id: &str, message: &str) -> AppResult<()> {
        if *self.failing.lock() {
            return Err(AppError::Internal("notification channel down".to_string()));
        }
        self.sent.lock().push((user_id.to_string(), message.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::PaymentMethod;
    use rust_decimal_macros::dec;

    fn request(payment_id: Uuid) -> ActivationRequest {
        ActivationRequest {
            user_id: "user-1".to_string(),
            product_id: Uuid::from_u128(7),
            product_slug: "fitness-monthly".to_string(),
            program: "fitness".to_string(),
            duration_days: 30,
            payment_id,
            payment_method: PaymentMethod::Wallet,
            amount: dec!(3.500),
            currency: "OMR".to_string(),
        }
    }

    #[tokio::test]
    async fn test_activation_is_idempotent_per_payment() {
        let activator = InMemoryActivator::new();
        let payment = Uuid::new_v4();

        let first = activator.activate(request(payment)).await.unwrap();
        let again = activator.activate(request(payment)).await.unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(activator.subscriptions().len(), 1);

        // A different payment is a different grant
        activator.activate(request(Uuid::new_v4())).await.unwrap();
        assert_eq!(activator.subscriptions().len(), 2);
    }

    #[tokio::test]
    async fn test_expiry_follows_duration() {
        let activator = InMemoryActivator::new();
        let sub = activator.activate(request(Uuid::new_v4())).await.unwrap();
        assert_eq!(sub.expires_at - sub.starts_at, Duration::days(30));
    }
}
