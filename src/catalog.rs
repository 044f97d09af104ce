//! Plan catalog: the read-only registry of pricing tiers.
//!
//! Plans are administered out of band; this engine only ever reads them.
//! Tier comparisons (upgrade vs. downgrade, "cheapest plan that fits")
//! always go through `sort_order`; price and tier may diverge, e.g.
//! during promotions, so price is never used as a tier proxy.
//!
//! # Example
//!
//! ```rust,ignore
//! use shoplane_billing::catalog::PlanCatalog;
//!
//! let catalog = PlanCatalog::builder()
//!     .plan("starter")
//!         .name("Starter")
//!         .max_storefronts(1)
//!         .free_trial_days(14)
//!         .sort_order(1)
//!         .done()
//!     .plan("professional")
//!         .name("Professional")
//!         .price_monthly(2900)
//!         .max_storefronts(3)
//!         .analytics(true)
//!         .sort_order(2)
//!         .done()
//!     .build();
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::period::BillingCycle;
use crate::quota::ResourceKind;

/// Sentinel limit value meaning "no ceiling".
pub const UNLIMITED: i64 = -1;

/// A priced tier defining resource limits and feature flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: Uuid,
    /// Unique human key, e.g. "starter", "professional".
    pub code: String,
    /// Display name shown to users.
    pub name: String,
    /// Monthly price in minor currency units.
    pub price_monthly: i64,
    /// Yearly price in minor currency units.
    pub price_yearly: i64,
    pub limits: PlanLimits,
    pub features: PlanFeatures,
    /// Platform commission on sales, as a fraction.
    pub commission_rate: f64,
    /// Trial length granted on signup; 0 means no trial.
    pub free_trial_days: u32,
    /// Total order used for every tier comparison.
    pub sort_order: i32,
    pub is_active: bool,
    pub is_recommended: bool,
}

impl Plan {
    /// Price for the given billing cycle, in minor units.
    #[must_use]
    pub fn price_for(&self, cycle: BillingCycle) -> i64 {
        match cycle {
            BillingCycle::Monthly => self.price_monthly,
            BillingCycle::Yearly => self.price_yearly,
        }
    }

    /// Limit for a resource kind; [`UNLIMITED`] means no ceiling.
    #[must_use]
    pub fn limit_for(&self, resource: ResourceKind) -> i64 {
        self.limits.for_resource(resource)
    }

    /// Whether this plan can accommodate `needed` units of a resource.
    #[must_use]
    pub fn satisfies(&self, resource: ResourceKind, needed: i64) -> bool {
        let limit = self.limit_for(resource);
        limit == UNLIMITED || limit >= needed
    }
}

/// Per-resource ceilings for a plan. `-1` denotes unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    pub max_storefronts: i64,
    pub max_products_per_storefront: i64,
    pub max_staff_per_storefront: i64,
    pub max_images_total: i64,
}

impl PlanLimits {
    /// Limits with every ceiling removed.
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            max_storefronts: UNLIMITED,
            max_products_per_storefront: UNLIMITED,
            max_staff_per_storefront: UNLIMITED,
            max_images_total: UNLIMITED,
        }
    }

    #[must_use]
    pub fn for_resource(&self, resource: ResourceKind) -> i64 {
        match resource {
            ResourceKind::Storefront => self.max_storefronts,
            ResourceKind::Product => self.max_products_per_storefront,
            ResourceKind::Staff => self.max_staff_per_storefront,
            ResourceKind::Image => self.max_images_total,
        }
    }
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self {
            max_storefronts: 0,
            max_products_per_storefront: 0,
            max_staff_per_storefront: 0,
            max_images_total: 0,
        }
    }
}

/// Boolean feature flags attached to a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanFeatures {
    pub ai_assistant: bool,
    pub live_shopping: bool,
    pub export_data: bool,
    pub custom_domain: bool,
    pub analytics: bool,
    pub priority_support: bool,
}

/// Read-only collection of plans.
///
/// Holds plans sorted by `sort_order` ascending so ordered enumeration and
/// "cheapest satisfying" scans are simple linear walks.
#[derive(Debug, Clone, Default)]
pub struct PlanCatalog {
    plans: Vec<Plan>,
}

impl PlanCatalog {
    /// Build a catalog from pre-loaded plans (e.g. rows read at startup).
    #[must_use]
    pub fn new(mut plans: Vec<Plan>) -> Self {
        plans.sort_by_key(|p| p.sort_order);
        Self { plans }
    }

    /// Create a builder for constructing a catalog in code.
    #[must_use]
    pub fn builder() -> PlanCatalogBuilder {
        PlanCatalogBuilder::default()
    }

    /// All active plans, ordered by `sort_order` ascending.
    pub fn plans(&self) -> impl Iterator<Item = &Plan> {
        self.plans.iter().filter(|p| p.is_active)
    }

    /// Look up a plan by its unique code.
    #[must_use]
    pub fn by_code(&self, code: &str) -> Option<&Plan> {
        self.plans.iter().find(|p| p.code == code)
    }

    /// Look up a plan by row id.
    #[must_use]
    pub fn by_id(&self, id: Uuid) -> Option<&Plan> {
        self.plans.iter().find(|p| p.id == id)
    }

    /// The lowest-tier active plan (minimum `sort_order`), conventionally
    /// the free "starter" tier used as the no-subscription fallback.
    #[must_use]
    pub fn lowest_tier(&self) -> Option<&Plan> {
        self.plans().next()
    }

    /// Resolve the fallback plan for users without a subscription row:
    /// the configured code if it names an active plan, otherwise the
    /// lowest active tier.
    #[must_use]
    pub fn fallback(&self, preferred_code: &str) -> Option<&Plan> {
        self.by_code(preferred_code)
            .filter(|p| p.is_active)
            .or_else(|| self.lowest_tier())
    }

    /// Cheapest active plan (by `sort_order`) whose limit for `resource`
    /// accommodates `needed` units. Unlimited plans always qualify.
    #[must_use]
    pub fn cheapest_satisfying(&self, resource: ResourceKind, needed: i64) -> Option<&Plan> {
        self.plans().find(|p| p.satisfies(resource, needed))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

/// Builder for constructing a catalog of plans.
#[derive(Debug, Default)]
#[must_use = "builder does nothing until you call build()"]
pub struct PlanCatalogBuilder {
    plans: Vec<Plan>,
}

impl PlanCatalogBuilder {
    /// Start defining a new plan with the given code.
    pub fn plan(self, code: &str) -> PlanBuilder {
        PlanBuilder {
            parent: self,
            plan: Plan {
                id: Uuid::new_v4(),
                code: code.to_string(),
                name: code.to_string(),
                price_monthly: 0,
                price_yearly: 0,
                limits: PlanLimits::default(),
                features: PlanFeatures::default(),
                commission_rate: 0.0,
                free_trial_days: 0,
                sort_order: 0,
                is_active: true,
                is_recommended: false,
            },
        }
    }

    pub fn build(self) -> PlanCatalog {
        PlanCatalog::new(self.plans)
    }
}

/// Builder for a single plan.
#[derive(Debug)]
pub struct PlanBuilder {
    parent: PlanCatalogBuilder,
    plan: Plan,
}

impl PlanBuilder {
    pub fn id(mut self, id: Uuid) -> Self {
        self.plan.id = id;
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.plan.name = name.to_string();
        self
    }

    pub fn price_monthly(mut self, minor_units: i64) -> Self {
        self.plan.price_monthly = minor_units;
        self
    }

    pub fn price_yearly(mut self, minor_units: i64) -> Self {
        self.plan.price_yearly = minor_units;
        self
    }

    pub fn max_storefronts(mut self, max: i64) -> Self {
        self.plan.limits.max_storefronts = max;
        self
    }

    pub fn max_products_per_storefront(mut self, max: i64) -> Self {
        self.plan.limits.max_products_per_storefront = max;
        self
    }

    pub fn max_staff_per_storefront(mut self, max: i64) -> Self {
        self.plan.limits.max_staff_per_storefront = max;
        self
    }

    pub fn max_images_total(mut self, max: i64) -> Self {
        self.plan.limits.max_images_total = max;
        self
    }

    pub fn limits(mut self, limits: PlanLimits) -> Self {
        self.plan.limits = limits;
        self
    }

    pub fn ai_assistant(mut self, enabled: bool) -> Self {
        self.plan.features.ai_assistant = enabled;
        self
    }

    pub fn live_shopping(mut self, enabled: bool) -> Self {
        self.plan.features.live_shopping = enabled;
        self
    }

    pub fn export_data(mut self, enabled: bool) -> Self {
        self.plan.features.export_data = enabled;
        self
    }

    pub fn custom_domain(mut self, enabled: bool) -> Self {
        self.plan.features.custom_domain = enabled;
        self
    }

    pub fn analytics(mut self, enabled: bool) -> Self {
        self.plan.features.analytics = enabled;
        self
    }

    pub fn priority_support(mut self, enabled: bool) -> Self {
        self.plan.features.priority_support = enabled;
        self
    }

    pub fn commission_rate(mut self, rate: f64) -> Self {
        self.plan.commission_rate = rate;
        self
    }

    pub fn free_trial_days(mut self, days: u32) -> Self {
        self.plan.free_trial_days = days;
        self
    }

    pub fn sort_order(mut self, order: i32) -> Self {
        self.plan.sort_order = order;
        self
    }

    pub fn active(mut self, is_active: bool) -> Self {
        self.plan.is_active = is_active;
        self
    }

    pub fn recommended(mut self, is_recommended: bool) -> Self {
        self.plan.is_recommended = is_recommended;
        self
    }

    /// Finish defining this plan and return to the catalog builder.
    pub fn done(mut self) -> PlanCatalogBuilder {
        self.parent.plans.push(self.plan);
        self.parent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_catalog() -> PlanCatalog {
        PlanCatalog::builder()
            .plan("starter")
            .name("Starter")
            .max_storefronts(1)
            .max_products_per_storefront(20)
            .free_trial_days(14)
            .sort_order(1)
            .done()
            .plan("professional")
            .name("Professional")
            .price_monthly(2900)
            .price_yearly(29000)
            .max_storefronts(3)
            .max_products_per_storefront(200)
            .analytics(true)
            .sort_order(2)
            .done()
            .plan("enterprise")
            .name("Enterprise")
            .price_monthly(9900)
            .price_yearly(99000)
            .limits(PlanLimits::unlimited())
            .analytics(true)
            .priority_support(true)
            .sort_order(3)
            .done()
            .build()
    }

    #[test]
    fn plans_ordered_by_sort_order() {
        let catalog = test_catalog();
        let codes: Vec<&str> = catalog.plans().map(|p| p.code.as_str()).collect();
        assert_eq!(codes, vec!["starter", "professional", "enterprise"]);
    }

    #[test]
    fn inactive_plans_excluded_from_enumeration_but_resolvable() {
        let catalog = PlanCatalog::builder()
            .plan("legacy")
            .sort_order(0)
            .active(false)
            .done()
            .plan("starter")
            .sort_order(1)
            .done()
            .build();

        assert_eq!(catalog.plans().count(), 1);
        assert_eq!(catalog.lowest_tier().unwrap().code, "starter");
        // Direct lookup still resolves, e.g. for old subscription rows.
        assert!(catalog.by_code("legacy").is_some());
    }

    #[test]
    fn lookup_by_code_and_id() {
        let catalog = test_catalog();
        let pro = catalog.by_code("professional").unwrap();
        assert_eq!(catalog.by_id(pro.id).unwrap().code, "professional");
        assert!(catalog.by_code("nonexistent").is_none());
    }

    #[test]
    fn cheapest_satisfying_walks_tiers_up() {
        let catalog = test_catalog();

        let plan = catalog.cheapest_satisfying(ResourceKind::Storefront, 2).unwrap();
        assert_eq!(plan.code, "professional");

        // Nothing bounded fits 50 storefronts; the unlimited tier does.
        let plan = catalog.cheapest_satisfying(ResourceKind::Storefront, 50).unwrap();
        assert_eq!(plan.code, "enterprise");
    }

    #[test]
    fn unlimited_sentinel() {
        let catalog = test_catalog();
        let enterprise = catalog.by_code("enterprise").unwrap();
        assert_eq!(enterprise.limit_for(ResourceKind::Storefront), UNLIMITED);
        assert!(enterprise.satisfies(ResourceKind::Storefront, i64::MAX));
    }

    #[test]
    fn fallback_prefers_configured_code() {
        let catalog = test_catalog();
        assert_eq!(catalog.fallback("starter").unwrap().code, "starter");
        // Unknown code degrades to the lowest active tier.
        assert_eq!(catalog.fallback("free").unwrap().code, "starter");
    }

    #[test]
    fn price_for_cycle() {
        let catalog = test_catalog();
        let pro = catalog.by_code("professional").unwrap();
        assert_eq!(pro.price_for(BillingCycle::Monthly), 2900);
        assert_eq!(pro.price_for(BillingCycle::Yearly), 29000);
    }
}
