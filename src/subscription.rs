//! Subscription lifecycle state machine.
//!
//! Owns creation, plan changes, cancellation and payment recording for a
//! user's subscription row. Every transition persists the new row state
//! together with an append-only [`HistoryRecord`](crate::ledger::HistoryRecord)
//! in a single atomic store call, and emits a structured tracing event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{Plan, PlanCatalog, PlanFeatures, PlanLimits};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::{BillingError, Result};
use crate::ledger::{HistoryAction, HistoryRecord, PaymentRecord, PaymentStatus};
use crate::period::{initial_period, BillingCycle};
use crate::quota::ResourceKind;
use crate::storage::{BillingStore, PaidMarker};
use crate::validation::{validate_payment_ref, validate_plan_code};

/// Lifecycle state of a subscription row.
///
/// "No subscription" is implicit: the absence of a row with a live status.
/// Expiry is recorded as a history action, not a distinct row status: a
/// canceled row past its `expires_at` is treated the same as no row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trial,
    Active,
    Canceled,
}

impl SubscriptionStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::Active => "active",
            Self::Canceled => "canceled",
        }
    }

    /// Live statuses are the ones the per-user uniqueness constraint covers.
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Trial | Self::Active)
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user's binding to a plan over a billing period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub status: SubscriptionStatus,
    pub billing_cycle: BillingCycle,
    pub started_at: DateTime<Utc>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub canceled_at: Option<DateTime<Utc>>,
    /// End of the grace window after cancellation; the row keeps its
    /// entitlements until this instant.
    pub expires_at: Option<DateTime<Utc>>,
    pub last_payment_id: Option<String>,
    pub last_payment_at: Option<DateTime<Utc>>,
    pub next_payment_at: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
    pub auto_renew: bool,
    /// Cached live storefront count, maintained by storefront CRUD.
    pub used_storefronts: i64,
    pub metadata: serde_json::Value,
    pub notes: Option<String>,
}

impl Subscription {
    /// Check if the row is live (Trial or Active).
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }

    /// Check if the row still grants entitlements at `now`: live, or
    /// canceled with an unexpired grace window.
    #[must_use]
    pub fn is_entitled(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            SubscriptionStatus::Trial | SubscriptionStatus::Active => true,
            SubscriptionStatus::Canceled => self.expires_at.is_some_and(|exp| exp > now),
        }
    }

    /// Check if the subscription is in its trial period.
    #[must_use]
    pub fn is_trialing(&self) -> bool {
        self.status == SubscriptionStatus::Trial
    }
}

/// Sparse update for a subscription row.
///
/// `None` leaves the corresponding field untouched; fields are tagged
/// present/absent rather than carrying sentinel values, so "unset" and
/// "set to zero" never collide.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionPatch {
    pub status: Option<SubscriptionStatus>,
    pub plan_id: Option<Uuid>,
    pub billing_cycle: Option<BillingCycle>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub auto_renew: Option<bool>,
    pub next_payment_at: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
    pub used_storefronts: Option<i64>,
    pub notes: Option<String>,
}

impl SubscriptionPatch {
    /// Apply the provided fields onto a row, leaving the rest untouched.
    pub fn apply(&self, sub: &mut Subscription) {
        if let Some(status) = self.status {
            sub.status = status;
        }
        if let Some(plan_id) = self.plan_id {
            sub.plan_id = plan_id;
        }
        if let Some(cycle) = self.billing_cycle {
            sub.billing_cycle = cycle;
        }
        if let Some(at) = self.canceled_at {
            sub.canceled_at = Some(at);
        }
        if let Some(at) = self.expires_at {
            sub.expires_at = Some(at);
        }
        if let Some(auto_renew) = self.auto_renew {
            sub.auto_renew = auto_renew;
        }
        if let Some(at) = self.next_payment_at {
            sub.next_payment_at = Some(at);
        }
        if let Some(ref method) = self.payment_method {
            sub.payment_method = Some(method.clone());
        }
        if let Some(count) = self.used_storefronts {
            sub.used_storefronts = count;
        }
        if let Some(ref notes) = self.notes {
            sub.notes = Some(notes.clone());
        }
    }
}

/// Request to create a subscription.
#[derive(Debug, Clone)]
pub struct CreateSubscriptionRequest {
    pub user_id: Uuid,
    pub plan_code: String,
    pub billing_cycle: BillingCycle,
    pub start_trial: bool,
    pub payment_method: Option<String>,
}

/// Request to record a payment outcome from the billing collaborator.
#[derive(Debug, Clone)]
pub struct RecordPaymentRequest {
    pub subscription_id: Uuid,
    /// External gateway reference.
    pub payment_id: String,
    /// Amount in minor currency units.
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
}

/// Outcome of a plan change.
#[derive(Debug, Clone)]
pub struct PlanChange {
    pub subscription: Subscription,
    /// `Upgraded` or `Downgraded`, classified by `sort_order`.
    pub action: HistoryAction,
    pub from_plan_id: Uuid,
    pub to_plan_id: Uuid,
}

/// Read-optimized projection of subscription + plan + usage.
///
/// Users without an entitled row are presented on the fallback tier with
/// zero price and usage counted from live resources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    pub user_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub plan_code: String,
    pub plan_name: String,
    pub status: Option<SubscriptionStatus>,
    pub billing_cycle: Option<BillingCycle>,
    /// Price for the row's billing cycle in minor units; 0 on fallback.
    pub price: i64,
    pub current_period_end: Option<DateTime<Utc>>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub auto_renew: bool,
    pub storefronts_used: i64,
    pub limits: PlanLimits,
    pub features: PlanFeatures,
}

/// Classify a plan change by tier order.
///
/// A strictly higher `sort_order` is an upgrade; anything else, including
/// a tie, records as a downgrade. No two active plans share a sort order
/// in practice, so the tie branch is pinned by test rather than exercised
/// in production.
#[must_use]
pub fn classify_change(current: &Plan, new: &Plan) -> HistoryAction {
    if new.sort_order > current.sort_order {
        HistoryAction::Upgraded
    } else {
        HistoryAction::Downgraded
    }
}

/// Subscription lifecycle operations.
pub struct SubscriptionManager<S: BillingStore, C: Clock> {
    store: S,
    clock: C,
    catalog: PlanCatalog,
    config: EngineConfig,
}

impl<S: BillingStore, C: Clock> SubscriptionManager<S, C> {
    #[must_use]
    pub fn new(store: S, clock: C, catalog: PlanCatalog, config: EngineConfig) -> Self {
        Self {
            store,
            clock,
            catalog,
            config,
        }
    }

    /// Create a subscription for a user.
    ///
    /// Fails with [`BillingError::DuplicateSubscription`] if the user
    /// already has a live row, and [`BillingError::PlanNotFound`] for an
    /// unknown plan code. The row insert, the uniqueness check and the
    /// `Created` history append happen in one atomic store call; the
    /// pre-check here only produces a fast conflict before any write.
    pub async fn create(&self, req: CreateSubscriptionRequest) -> Result<Subscription> {
        validate_plan_code(&req.plan_code)?;

        if let Some(existing) = self.store.find_live_subscription(req.user_id).await? {
            tracing::debug!(
                target: "shoplane::billing",
                user_id = %req.user_id,
                existing = %existing.id,
                "create rejected, user already has a live subscription"
            );
            return Err(BillingError::DuplicateSubscription {
                user_id: req.user_id,
            });
        }

        // Retired plans stay resolvable by id for old rows, but new
        // subscriptions only land on active ones.
        let plan = self
            .catalog
            .by_code(&req.plan_code)
            .filter(|p| p.is_active)
            .ok_or_else(|| BillingError::PlanNotFound {
                code: req.plan_code.clone(),
            })?;

        let now = self.clock.now();
        let period = initial_period(now, req.billing_cycle, req.start_trial, plan.free_trial_days);

        let subscription = Subscription {
            id: Uuid::new_v4(),
            user_id: req.user_id,
            plan_id: plan.id,
            status: period.status,
            billing_cycle: req.billing_cycle,
            started_at: now,
            trial_ends_at: period.trial_ends_at,
            current_period_start: period.period_start,
            current_period_end: period.period_end,
            canceled_at: None,
            expires_at: None,
            last_payment_id: None,
            last_payment_at: None,
            next_payment_at: None,
            payment_method: req.payment_method,
            auto_renew: true,
            used_storefronts: 0,
            metadata: serde_json::json!({}),
            notes: None,
        };

        let history =
            HistoryRecord::new(subscription.id, req.user_id, HistoryAction::Created, now)
                .with_plans(None, Some(plan.id));

        self.store.insert_subscription(&subscription, &history).await?;

        tracing::info!(
            target: "shoplane::billing",
            user_id = %req.user_id,
            subscription_id = %subscription.id,
            plan = %plan.code,
            status = %subscription.status,
            cycle = %req.billing_cycle,
            "subscription created"
        );

        Ok(subscription)
    }

    /// Switch a live subscription to another plan.
    ///
    /// Updates the plan (and optionally the billing cycle) in place; the
    /// current billing period is not reset. The transition is recorded as
    /// `Upgraded` or `Downgraded` per [`classify_change`].
    pub async fn change_plan(
        &self,
        user_id: Uuid,
        new_plan_code: &str,
        billing_cycle: Option<BillingCycle>,
    ) -> Result<PlanChange> {
        validate_plan_code(new_plan_code)?;

        let sub = self
            .store
            .find_live_subscription(user_id)
            .await?
            .ok_or(BillingError::SubscriptionNotFound { user_id })?;

        let new_plan = self
            .catalog
            .by_code(new_plan_code)
            .filter(|p| p.is_active)
            .ok_or_else(|| BillingError::PlanNotFound {
                code: new_plan_code.to_string(),
            })?;

        let current_plan =
            self.catalog
                .by_id(sub.plan_id)
                .ok_or_else(|| BillingError::PlanNotFound {
                    code: sub.plan_id.to_string(),
                })?;

        let action = classify_change(current_plan, new_plan);
        let now = self.clock.now();

        let patch = SubscriptionPatch {
            plan_id: Some(new_plan.id),
            billing_cycle,
            ..SubscriptionPatch::default()
        };
        let history = HistoryRecord::new(sub.id, user_id, action, now)
            .with_plans(Some(current_plan.id), Some(new_plan.id));

        let updated = self.store.update_subscription(sub.id, &patch, &history).await?;

        tracing::info!(
            target: "shoplane::billing",
            user_id = %user_id,
            subscription_id = %sub.id,
            from_plan = %current_plan.code,
            to_plan = %new_plan.code,
            action = %action,
            "subscription plan changed"
        );

        Ok(PlanChange {
            subscription: updated,
            action,
            from_plan_id: current_plan.id,
            to_plan_id: new_plan.id,
        })
    }

    /// Cancel a live subscription.
    ///
    /// Cancellation stops renewal, not the current-period entitlement: the
    /// row stays usable until `expires_at` (the current period end).
    pub async fn cancel(&self, user_id: Uuid, reason: Option<String>) -> Result<Subscription> {
        let sub = self
            .store
            .find_live_subscription(user_id)
            .await?
            .ok_or(BillingError::SubscriptionNotFound { user_id })?;

        let now = self.clock.now();
        let patch = SubscriptionPatch {
            status: Some(SubscriptionStatus::Canceled),
            canceled_at: Some(now),
            expires_at: Some(sub.current_period_end),
            auto_renew: Some(false),
            ..SubscriptionPatch::default()
        };
        let history = HistoryRecord::new(sub.id, user_id, HistoryAction::Canceled, now)
            .with_plans(Some(sub.plan_id), None)
            .with_reason(reason.clone());

        let updated = self.store.update_subscription(sub.id, &patch, &history).await?;

        tracing::info!(
            target: "shoplane::billing",
            user_id = %user_id,
            subscription_id = %sub.id,
            expires_at = %sub.current_period_end,
            reason = reason.as_deref().unwrap_or(""),
            "subscription canceled"
        );

        Ok(updated)
    }

    /// Record a payment outcome reported by the billing collaborator.
    ///
    /// Always appends a [`PaymentRecord`]; a `Completed` payment also
    /// stamps `last_payment_id`/`last_payment_at` on the row, in the same
    /// atomic store call. Period renewal is a separate scheduled process
    /// that this engine only feeds.
    pub async fn record_payment(&self, req: RecordPaymentRequest) -> Result<PaymentRecord> {
        validate_payment_ref(&req.payment_id)?;
        if req.amount < 0 {
            return Err(BillingError::invalid_argument(format!(
                "payment amount must be non-negative, got {}",
                req.amount
            )));
        }

        let sub = self
            .store
            .get_subscription(req.subscription_id)
            .await?
            .ok_or(BillingError::UnknownSubscription {
                subscription_id: req.subscription_id,
            })?;

        let now = self.clock.now();
        let payment = PaymentRecord {
            id: Uuid::new_v4(),
            subscription_id: sub.id,
            user_id: sub.user_id,
            payment_id: req.payment_id.clone(),
            amount: req.amount,
            currency: req.currency,
            period_start: sub.current_period_start,
            period_end: sub.current_period_end,
            status: req.status,
            paid_at: (req.status == PaymentStatus::Completed).then_some(now),
        };

        let mark_paid = (req.status == PaymentStatus::Completed).then(|| PaidMarker {
            subscription_id: sub.id,
            payment_id: req.payment_id.clone(),
            paid_at: now,
        });

        self.store.record_payment(&payment, mark_paid).await?;

        tracing::info!(
            target: "shoplane::billing",
            subscription_id = %sub.id,
            payment_id = %req.payment_id,
            amount = req.amount,
            status = %req.status,
            "payment recorded"
        );

        Ok(payment)
    }

    /// Read projection for a user: subscription + plan + usage.
    ///
    /// Falls back to the configured lowest-tier plan with zero price when
    /// no entitled row exists; usage then comes from live resource counts
    /// rather than the cached counter.
    pub async fn subscription_info(&self, user_id: Uuid) -> Result<SubscriptionInfo> {
        let now = self.clock.now();

        if let Some(sub) = self.store.find_entitled_subscription(user_id, now).await? {
            let plan = self
                .catalog
                .by_id(sub.plan_id)
                .ok_or_else(|| BillingError::PlanNotFound {
                    code: sub.plan_id.to_string(),
                })?;

            return Ok(SubscriptionInfo {
                user_id,
                subscription_id: Some(sub.id),
                plan_code: plan.code.clone(),
                plan_name: plan.name.clone(),
                status: Some(sub.status),
                billing_cycle: Some(sub.billing_cycle),
                price: plan.price_for(sub.billing_cycle),
                current_period_end: Some(sub.current_period_end),
                trial_ends_at: sub.trial_ends_at,
                expires_at: sub.expires_at,
                auto_renew: sub.auto_renew,
                storefronts_used: sub.used_storefronts,
                limits: plan.limits,
                features: plan.features,
            });
        }

        let plan = self
            .catalog
            .fallback(&self.config.fallback_plan_code)
            .ok_or_else(|| BillingError::Internal(anyhow::anyhow!("plan catalog is empty")))?;
        let storefronts_used = self
            .store
            .count_usage(user_id, ResourceKind::Storefront)
            .await?;

        Ok(SubscriptionInfo {
            user_id,
            subscription_id: None,
            plan_code: plan.code.clone(),
            plan_name: plan.name.clone(),
            status: None,
            billing_cycle: None,
            price: 0,
            current_period_end: None,
            trial_ends_at: None,
            expires_at: None,
            auto_renew: false,
            storefronts_used,
            limits: plan.limits,
            features: plan.features,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PlanCatalog;
    use crate::clock::FixedClock;
    use crate::storage::test::InMemoryBillingStore;
    use chrono::{Duration, TimeZone};

    fn test_catalog() -> PlanCatalog {
        PlanCatalog::builder()
            .plan("starter")
            .name("Starter")
            .max_storefronts(1)
            .free_trial_days(14)
            .sort_order(1)
            .done()
            .plan("professional")
            .name("Professional")
            .price_monthly(2900)
            .price_yearly(29000)
            .max_storefronts(3)
            .sort_order(2)
            .done()
            .plan("promo")
            .name("Promo")
            .price_monthly(1900)
            .max_storefronts(3)
            .sort_order(2)
            .done()
            .plan("legacy")
            .name("Legacy")
            .max_storefronts(2)
            .sort_order(0)
            .active(false)
            .done()
            .build()
    }

    fn test_manager() -> (
        SubscriptionManager<InMemoryBillingStore, FixedClock>,
        InMemoryBillingStore,
        FixedClock,
    ) {
        let store = InMemoryBillingStore::new();
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
        let manager = SubscriptionManager::new(
            store.clone(),
            clock.clone(),
            test_catalog(),
            EngineConfig::default(),
        );
        (manager, store, clock)
    }

    fn create_req(user_id: Uuid, plan_code: &str, start_trial: bool) -> CreateSubscriptionRequest {
        CreateSubscriptionRequest {
            user_id,
            plan_code: plan_code.to_string(),
            billing_cycle: BillingCycle::Monthly,
            start_trial,
            payment_method: None,
        }
    }

    #[tokio::test]
    async fn create_with_trial() {
        let (manager, store, clock) = test_manager();
        let user_id = Uuid::new_v4();

        let sub = manager.create(create_req(user_id, "starter", true)).await.unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Trial);
        assert_eq!(sub.trial_ends_at, Some(clock.now() + Duration::days(14)));
        assert_eq!(sub.current_period_end, sub.trial_ends_at.unwrap());
        assert!(sub.auto_renew);
        assert_eq!(sub.used_storefronts, 0);

        let history = store.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action, HistoryAction::Created);
        assert_eq!(history[0].to_plan_id, Some(sub.plan_id));
    }

    #[tokio::test]
    async fn create_without_trial_is_active_for_one_month() {
        let (manager, _store, clock) = test_manager();
        let user_id = Uuid::new_v4();

        let sub = manager.create(create_req(user_id, "professional", false)).await.unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.trial_ends_at, None);
        assert_eq!(
            sub.current_period_end,
            clock.now() + chrono::Months::new(1)
        );
        assert!(sub.current_period_end > sub.current_period_start);
    }

    #[tokio::test]
    async fn second_create_conflicts() {
        let (manager, _store, _clock) = test_manager();
        let user_id = Uuid::new_v4();

        manager.create(create_req(user_id, "starter", true)).await.unwrap();
        let err = manager
            .create(create_req(user_id, "professional", false))
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::DuplicateSubscription { .. }));
    }

    #[tokio::test]
    async fn create_after_cancellation_and_expiry_succeeds() {
        let (manager, _store, clock) = test_manager();
        let user_id = Uuid::new_v4();

        manager.create(create_req(user_id, "professional", false)).await.unwrap();
        manager.cancel(user_id, None).await.unwrap();

        // The canceled row is no longer live, so a new subscription is fine.
        clock.advance(Duration::days(40));
        let sub = manager.create(create_req(user_id, "starter", false)).await.unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn unknown_plan_is_not_found() {
        let (manager, _store, _clock) = test_manager();
        let err = manager
            .create(create_req(Uuid::new_v4(), "platinum", false))
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::PlanNotFound { .. }));
    }

    #[tokio::test]
    async fn retired_plan_rejected_for_new_subscriptions() {
        let (manager, _store, _clock) = test_manager();
        let user_id = Uuid::new_v4();

        let err = manager
            .create(create_req(user_id, "legacy", false))
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::PlanNotFound { .. }));

        manager.create(create_req(user_id, "starter", false)).await.unwrap();
        let err = manager.change_plan(user_id, "legacy", None).await.unwrap_err();
        assert!(matches!(err, BillingError::PlanNotFound { .. }));
    }

    #[tokio::test]
    async fn upgrade_records_upgraded() {
        let (manager, store, _clock) = test_manager();
        let user_id = Uuid::new_v4();

        manager.create(create_req(user_id, "starter", false)).await.unwrap();
        let change = manager.change_plan(user_id, "professional", None).await.unwrap();

        assert_eq!(change.action, HistoryAction::Upgraded);
        let history = store.history();
        assert_eq!(history.last().unwrap().action, HistoryAction::Upgraded);
        assert_eq!(history.last().unwrap().from_plan_id, Some(change.from_plan_id));
        assert_eq!(history.last().unwrap().to_plan_id, Some(change.to_plan_id));
    }

    #[tokio::test]
    async fn downgrade_records_downgraded() {
        let (manager, _store, _clock) = test_manager();
        let user_id = Uuid::new_v4();

        manager.create(create_req(user_id, "professional", false)).await.unwrap();
        let change = manager.change_plan(user_id, "starter", None).await.unwrap();
        assert_eq!(change.action, HistoryAction::Downgraded);
    }

    #[tokio::test]
    async fn equal_sort_order_counts_as_downgrade() {
        let (manager, _store, _clock) = test_manager();
        let user_id = Uuid::new_v4();

        // "professional" and "promo" share a sort order.
        manager.create(create_req(user_id, "professional", false)).await.unwrap();
        let change = manager.change_plan(user_id, "promo", None).await.unwrap();
        assert_eq!(change.action, HistoryAction::Downgraded);
    }

    #[tokio::test]
    async fn change_plan_keeps_period() {
        let (manager, _store, _clock) = test_manager();
        let user_id = Uuid::new_v4();

        let created = manager.create(create_req(user_id, "starter", false)).await.unwrap();
        let change = manager
            .change_plan(user_id, "professional", Some(BillingCycle::Yearly))
            .await
            .unwrap();

        assert_eq!(
            change.subscription.current_period_end,
            created.current_period_end
        );
        assert_eq!(change.subscription.billing_cycle, BillingCycle::Yearly);
    }

    #[tokio::test]
    async fn change_plan_without_subscription_is_not_found() {
        let (manager, _store, _clock) = test_manager();
        let err = manager
            .change_plan(Uuid::new_v4(), "professional", None)
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::SubscriptionNotFound { .. }));
    }

    #[tokio::test]
    async fn cancel_sets_grace_window() {
        let (manager, store, clock) = test_manager();
        let user_id = Uuid::new_v4();

        let created = manager.create(create_req(user_id, "professional", false)).await.unwrap();
        let canceled = manager
            .cancel(user_id, Some("too expensive".to_string()))
            .await
            .unwrap();

        assert_eq!(canceled.status, SubscriptionStatus::Canceled);
        assert_eq!(canceled.canceled_at, Some(clock.now()));
        assert_eq!(canceled.expires_at, Some(created.current_period_end));
        assert!(!canceled.auto_renew);

        let history = store.history();
        assert_eq!(history.last().unwrap().action, HistoryAction::Canceled);
        assert_eq!(history.last().unwrap().reason.as_deref(), Some("too expensive"));
    }

    #[tokio::test]
    async fn completed_payment_stamps_subscription() {
        let (manager, store, clock) = test_manager();
        let user_id = Uuid::new_v4();

        let sub = manager.create(create_req(user_id, "professional", false)).await.unwrap();
        let payment = manager
            .record_payment(RecordPaymentRequest {
                subscription_id: sub.id,
                payment_id: "pay_abc123".to_string(),
                amount: 2900,
                currency: "usd".to_string(),
                status: PaymentStatus::Completed,
            })
            .await
            .unwrap();

        assert_eq!(payment.paid_at, Some(clock.now()));
        assert_eq!(payment.period_start, sub.current_period_start);
        assert_eq!(payment.period_end, sub.current_period_end);

        let updated = store.get(sub.id).unwrap();
        assert_eq!(updated.last_payment_id.as_deref(), Some("pay_abc123"));
        assert_eq!(updated.last_payment_at, Some(clock.now()));
        // Renewal is a separate process: status and period are untouched.
        assert_eq!(updated.status, sub.status);
        assert_eq!(updated.current_period_end, sub.current_period_end);
    }

    #[tokio::test]
    async fn failed_payment_only_appends() {
        let (manager, store, _clock) = test_manager();
        let user_id = Uuid::new_v4();

        let sub = manager.create(create_req(user_id, "professional", false)).await.unwrap();
        let payment = manager
            .record_payment(RecordPaymentRequest {
                subscription_id: sub.id,
                payment_id: "pay_failed".to_string(),
                amount: 2900,
                currency: "usd".to_string(),
                status: PaymentStatus::Failed,
            })
            .await
            .unwrap();

        assert_eq!(payment.paid_at, None);
        assert_eq!(store.payments().len(), 1);

        let row = store.get(sub.id).unwrap();
        assert_eq!(row.last_payment_id, None);
        assert_eq!(row.last_payment_at, None);
    }

    #[tokio::test]
    async fn payment_for_unknown_subscription() {
        let (manager, _store, _clock) = test_manager();
        let err = manager
            .record_payment(RecordPaymentRequest {
                subscription_id: Uuid::new_v4(),
                payment_id: "pay_x".to_string(),
                amount: 100,
                currency: "usd".to_string(),
                status: PaymentStatus::Pending,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::UnknownSubscription { .. }));
    }

    #[tokio::test]
    async fn info_for_subscribed_user() {
        let (manager, _store, _clock) = test_manager();
        let user_id = Uuid::new_v4();

        manager.create(create_req(user_id, "professional", false)).await.unwrap();
        let info = manager.subscription_info(user_id).await.unwrap();

        assert_eq!(info.plan_code, "professional");
        assert_eq!(info.price, 2900);
        assert_eq!(info.status, Some(SubscriptionStatus::Active));
        assert!(info.subscription_id.is_some());
    }

    #[tokio::test]
    async fn info_falls_back_to_lowest_tier_with_zero_price() {
        let (manager, store, _clock) = test_manager();
        let user_id = Uuid::new_v4();
        store.set_usage(user_id, ResourceKind::Storefront, 2);

        let info = manager.subscription_info(user_id).await.unwrap();

        assert_eq!(info.plan_code, "starter");
        assert_eq!(info.price, 0);
        assert_eq!(info.status, None);
        assert_eq!(info.subscription_id, None);
        // Usage comes from live counts, not a cached counter.
        assert_eq!(info.storefronts_used, 2);
    }

    #[test]
    fn patch_applies_only_present_fields() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut sub = Subscription {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            plan_id: Uuid::new_v4(),
            status: SubscriptionStatus::Active,
            billing_cycle: BillingCycle::Monthly,
            started_at: now,
            trial_ends_at: None,
            current_period_start: now,
            current_period_end: now + chrono::Months::new(1),
            canceled_at: None,
            expires_at: None,
            last_payment_id: None,
            last_payment_at: None,
            next_payment_at: None,
            payment_method: Some("card".to_string()),
            auto_renew: true,
            used_storefronts: 3,
            metadata: serde_json::json!({}),
            notes: None,
        };

        let patch = SubscriptionPatch {
            status: Some(SubscriptionStatus::Canceled),
            auto_renew: Some(false),
            ..SubscriptionPatch::default()
        };
        patch.apply(&mut sub);

        assert_eq!(sub.status, SubscriptionStatus::Canceled);
        assert!(!sub.auto_renew);
        // Everything else untouched.
        assert_eq!(sub.used_storefronts, 3);
        assert_eq!(sub.payment_method.as_deref(), Some("card"));
        assert_eq!(sub.billing_cycle, BillingCycle::Monthly);
    }
}
