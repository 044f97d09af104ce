//! Plan limit enforcement for resource creation.
//!
//! Resource CRUD calls [`QuotaEvaluator::check_limit`] before creating a
//! storefront, product, staff member or image. Evaluation is advisory
//! read-then-decide: the returned [`QuotaDecision`] says whether the
//! creation should proceed and, on denial, which plan would accommodate
//! the request.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{PlanCatalog, UNLIMITED};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::{BillingError, Result};
use crate::storage::BillingStore;

/// A quota-governed resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Storefront,
    Product,
    Staff,
    Image,
}

impl ResourceKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Storefront => "storefront",
            Self::Product => "product",
            Self::Staff => "staff",
            Self::Image => "image",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a quota check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaDecision {
    pub resource: ResourceKind,
    pub current_usage: i64,
    /// The plan's ceiling; [`UNLIMITED`] means none.
    pub limit: i64,
    pub allowed: bool,
    /// Human-readable denial explanation; `None` when allowed.
    pub message: Option<String>,
    /// Code of the cheapest plan that would fit the request, for upsell
    /// prompts. `None` when allowed or when no plan fits.
    pub required_plan: Option<String>,
}

impl QuotaDecision {
    /// Convert a denial into [`BillingError::InsufficientQuota`], for
    /// callers that want to propagate rather than branch.
    pub fn require(self) -> Result<Self> {
        if self.allowed {
            return Ok(self);
        }
        Err(BillingError::InsufficientQuota {
            resource: self.resource,
            current: self.current_usage,
            limit: self.limit,
            required_plan: self.required_plan,
        })
    }
}

/// Evaluates resource creation against the user's plan limits.
pub struct QuotaEvaluator<S: BillingStore, C: Clock> {
    store: S,
    clock: C,
    catalog: PlanCatalog,
    config: EngineConfig,
}

impl<S: BillingStore, C: Clock> QuotaEvaluator<S, C> {
    #[must_use]
    pub fn new(store: S, clock: C, catalog: PlanCatalog, config: EngineConfig) -> Self {
        Self {
            store,
            clock,
            catalog,
            config,
        }
    }

    /// Decide whether `requested` more units of `resource` fit within the
    /// user's plan.
    ///
    /// Users without an entitled subscription are evaluated against the
    /// configured fallback plan. Storefront checks for subscribed users
    /// read the cached `used_storefronts` counter; everything else counts
    /// live rows through the store.
    pub async fn check_limit(
        &self,
        user_id: Uuid,
        resource: ResourceKind,
        requested: i64,
    ) -> Result<QuotaDecision> {
        if requested <= 0 {
            return Err(BillingError::invalid_argument(format!(
                "requested amount must be positive, got {requested}"
            )));
        }

        let now = self.clock.now();
        let subscription = self.store.find_entitled_subscription(user_id, now).await?;

        let plan = match &subscription {
            Some(sub) => {
                self.catalog
                    .by_id(sub.plan_id)
                    .ok_or_else(|| BillingError::PlanNotFound {
                        code: sub.plan_id.to_string(),
                    })?
            }
            None => self
                .catalog
                .fallback(&self.config.fallback_plan_code)
                .ok_or_else(|| BillingError::Internal(anyhow::anyhow!("plan catalog is empty")))?,
        };

        let current_usage = match (&subscription, resource) {
            (Some(sub), ResourceKind::Storefront) => sub.used_storefronts,
            _ => self.store.count_usage(user_id, resource).await?,
        };

        let limit = plan.limit_for(resource);
        if limit == UNLIMITED {
            return Ok(QuotaDecision {
                resource,
                current_usage,
                limit,
                allowed: true,
                message: None,
                required_plan: None,
            });
        }

        let allowed = current_usage + requested <= limit;
        if allowed {
            return Ok(QuotaDecision {
                resource,
                current_usage,
                limit,
                allowed: true,
                message: None,
                required_plan: None,
            });
        }

        let needed = current_usage + requested;
        let required_plan = self
            .catalog
            .cheapest_satisfying(resource, needed)
            .map(|p| p.code.clone());

        tracing::debug!(
            target: "shoplane::billing",
            user_id = %user_id,
            resource = %resource,
            current_usage,
            requested,
            limit,
            plan = %plan.code,
            "quota check denied"
        );

        Ok(QuotaDecision {
            resource,
            current_usage,
            limit,
            allowed: false,
            message: Some(format!(
                "{resource} limit reached: {current_usage} used of {limit} on the {} plan",
                plan.name
            )),
            required_plan,
        })
    }
}
