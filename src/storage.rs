//! Storage abstraction for subscription state, history and payments.
//!
//! Implement [`BillingStore`] to persist rows in your database. Multi-step
//! mutations are exposed as single trait methods so implementations can
//! wrap them in one transaction; the engine never issues a write sequence
//! it expects the store to stitch together.
//!
//! An in-memory implementation is provided behind the `test-store` feature
//! (and in tests) for exercising the engine without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::ledger::{HistoryRecord, PaymentRecord};
use crate::quota::ResourceKind;
use crate::subscription::{Subscription, SubscriptionPatch};

/// Instruction to stamp a subscription row as paid, carried alongside the
/// payment append so both land in the same transaction.
#[derive(Debug, Clone)]
pub struct PaidMarker {
    pub subscription_id: Uuid,
    pub payment_id: String,
    pub paid_at: DateTime<Utc>,
}

/// Persistence seam for the billing engine.
///
/// # Atomicity contract
///
/// `insert_subscription`, `update_subscription` and `record_payment` each
/// bundle a row mutation with a ledger append. Implementations must apply
/// each call atomically: either everything in the call is persisted or
/// nothing is. Relational stores should additionally back the per-user
/// live-row uniqueness with a partial unique index on
/// `(user_id) WHERE status IN ('trial', 'active')` so concurrent inserts
/// cannot race past the in-call check.
#[async_trait]
pub trait BillingStore: Send + Sync {
    /// The user's live (Trial or Active) subscription, if any.
    /// At most one such row exists per user.
    async fn find_live_subscription(&self, user_id: Uuid) -> Result<Option<Subscription>>;

    /// The subscription granting entitlements at `now`: a live row, or a
    /// canceled row whose grace window (`expires_at`) has not yet passed.
    ///
    /// A user may hold both at once (cancel, then create a new
    /// subscription during the grace window); the live row always takes
    /// precedence.
    async fn find_entitled_subscription(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>>;

    /// Fetch a subscription by id regardless of status.
    async fn get_subscription(&self, subscription_id: Uuid) -> Result<Option<Subscription>>;

    /// Insert a new subscription row and append its `Created` history
    /// record atomically.
    ///
    /// Must fail with [`BillingError::DuplicateSubscription`] when the
    /// user already has a live row.
    ///
    /// [`BillingError::DuplicateSubscription`]: crate::error::BillingError::DuplicateSubscription
    async fn insert_subscription(
        &self,
        subscription: &Subscription,
        history: &HistoryRecord,
    ) -> Result<()>;

    /// Apply a sparse patch to a subscription row and append a history
    /// record atomically, returning the updated row.
    ///
    /// Fails with [`BillingError::UnknownSubscription`] if the row does
    /// not exist.
    ///
    /// [`BillingError::UnknownSubscription`]: crate::error::BillingError::UnknownSubscription
    async fn update_subscription(
        &self,
        subscription_id: Uuid,
        patch: &SubscriptionPatch,
        history: &HistoryRecord,
    ) -> Result<Subscription>;

    /// Append a payment record, and when `mark_paid` is set, stamp the
    /// subscription's `last_payment_id`/`last_payment_at` in the same
    /// transaction.
    async fn record_payment(
        &self,
        payment: &PaymentRecord,
        mark_paid: Option<PaidMarker>,
    ) -> Result<()>;

    /// Count the user's live resources of the given kind, for quota
    /// checks that cannot use the cached storefront counter.
    async fn count_usage(&self, user_id: Uuid, resource: ResourceKind) -> Result<i64>;
}

#[cfg(any(test, feature = "test-store"))]
pub mod test {
    //! In-memory store for tests and examples.

    use std::collections::HashMap;
    use std::sync::{Arc, RwLock};

    use super::*;
    use crate::error::BillingError;

    #[derive(Debug, Default)]
    struct Inner {
        subscriptions: HashMap<Uuid, Subscription>,
        history: Vec<HistoryRecord>,
        payments: Vec<PaymentRecord>,
        usage: HashMap<(Uuid, ResourceKind), i64>,
    }

    /// [`BillingStore`] backed by process memory.
    ///
    /// A single lock guards all tables, which makes every trait method
    /// trivially atomic. Cloning shares the underlying state.
    #[derive(Debug, Clone, Default)]
    pub struct InMemoryBillingStore {
        inner: Arc<RwLock<Inner>>,
    }

    impl InMemoryBillingStore {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Test helper: fetch a row synchronously.
        #[must_use]
        pub fn get(&self, subscription_id: Uuid) -> Option<Subscription> {
            self.inner
                .read()
                .unwrap()
                .subscriptions
                .get(&subscription_id)
                .cloned()
        }

        /// Test helper: the full history ledger in append order.
        #[must_use]
        pub fn history(&self) -> Vec<HistoryRecord> {
            self.inner.read().unwrap().history.clone()
        }

        /// Test helper: the full payment ledger in append order.
        #[must_use]
        pub fn payments(&self) -> Vec<PaymentRecord> {
            self.inner.read().unwrap().payments.clone()
        }

        /// Test helper: set the cached storefront counter on a row, as
        /// storefront CRUD would.
        pub fn set_used_storefronts(&self, subscription_id: Uuid, count: i64) {
            let mut inner = self.inner.write().unwrap();
            if let Some(sub) = inner.subscriptions.get_mut(&subscription_id) {
                sub.used_storefronts = count;
            }
        }

        /// Test helper: set the live resource count used by
        /// [`BillingStore::count_usage`].
        pub fn set_usage(&self, user_id: Uuid, resource: ResourceKind, count: i64) {
            self.inner
                .write()
                .unwrap()
                .usage
                .insert((user_id, resource), count);
        }
    }

    #[async_trait]
    impl BillingStore for InMemoryBillingStore {
        async fn find_live_subscription(&self, user_id: Uuid) -> Result<Option<Subscription>> {
            let inner = self.inner.read().unwrap();
            Ok(inner
                .subscriptions
                .values()
                .find(|s| s.user_id == user_id && s.is_live())
                .cloned())
        }

        async fn find_entitled_subscription(
            &self,
            user_id: Uuid,
            now: DateTime<Utc>,
        ) -> Result<Option<Subscription>> {
            let inner = self.inner.read().unwrap();
            // A live row wins over a canceled-in-grace row when both exist.
            let entitled = inner
                .subscriptions
                .values()
                .find(|s| s.user_id == user_id && s.is_live())
                .or_else(|| {
                    inner
                        .subscriptions
                        .values()
                        .find(|s| s.user_id == user_id && s.is_entitled(now))
                });
            Ok(entitled.cloned())
        }

        async fn get_subscription(&self, subscription_id: Uuid) -> Result<Option<Subscription>> {
            let inner = self.inner.read().unwrap();
            Ok(inner.subscriptions.get(&subscription_id).cloned())
        }

        async fn insert_subscription(
            &self,
            subscription: &Subscription,
            history: &HistoryRecord,
        ) -> Result<()> {
            let mut inner = self.inner.write().unwrap();
            if inner
                .subscriptions
                .values()
                .any(|s| s.user_id == subscription.user_id && s.is_live())
            {
                return Err(BillingError::DuplicateSubscription {
                    user_id: subscription.user_id,
                });
            }
            inner
                .subscriptions
                .insert(subscription.id, subscription.clone());
            inner.history.push(history.clone());
            Ok(())
        }

        async fn update_subscription(
            &self,
            subscription_id: Uuid,
            patch: &SubscriptionPatch,
            history: &HistoryRecord,
        ) -> Result<Subscription> {
            let mut inner = self.inner.write().unwrap();
            let sub = inner
                .subscriptions
                .get_mut(&subscription_id)
                .ok_or(BillingError::UnknownSubscription { subscription_id })?;
            patch.apply(sub);
            let updated = sub.clone();
            inner.history.push(history.clone());
            Ok(updated)
        }

        async fn record_payment(
            &self,
            payment: &PaymentRecord,
            mark_paid: Option<PaidMarker>,
        ) -> Result<()> {
            let mut inner = self.inner.write().unwrap();
            if let Some(marker) = mark_paid {
                let sub = inner
                    .subscriptions
                    .get_mut(&marker.subscription_id)
                    .ok_or(BillingError::UnknownSubscription {
                        subscription_id: marker.subscription_id,
                    })?;
                sub.last_payment_id = Some(marker.payment_id);
                sub.last_payment_at = Some(marker.paid_at);
            }
            inner.payments.push(payment.clone());
            Ok(())
        }

        async fn count_usage(&self, user_id: Uuid, resource: ResourceKind) -> Result<i64> {
            let inner = self.inner.read().unwrap();
            Ok(inner
                .usage
                .get(&(user_id, resource))
                .copied()
                .unwrap_or(0))
        }
    }

}
