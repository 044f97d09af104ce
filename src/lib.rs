//! Subscription lifecycle and quota enforcement for Shoplane storefronts.
//!
//! The engine answers two questions for the rest of the platform:
//!
//! - **"may this user create another X?"**: [`quota::QuotaEvaluator`]
//!   checks resource creation (storefronts, products, staff, images)
//!   against the limits of the user's plan, with `-1` meaning unlimited.
//! - **"what is this user subscribed to?"**: [`subscription::SubscriptionManager`]
//!   drives the Trial/Active/Canceled lifecycle, records plan changes in
//!   an append-only history ledger, and books payment outcomes reported
//!   by the external billing gateway.
//!
//! Persistence is abstracted behind [`storage::BillingStore`]; an
//! in-memory implementation ships behind the `test-store` feature. Time
//! is abstracted behind [`clock::Clock`] so period arithmetic stays
//! deterministic under test.
//!
//! ```rust,ignore
//! use shoplane_billing::{
//!     catalog::PlanCatalog, clock::SystemClock, config::EngineConfig,
//!     subscription::SubscriptionManager,
//! };
//!
//! let catalog = PlanCatalog::builder()
//!     .plan("starter").max_storefronts(1).free_trial_days(14).sort_order(1).done()
//!     .plan("professional").price_monthly(2900).max_storefronts(3).sort_order(2).done()
//!     .build();
//!
//! let config = EngineConfig::builder().from_env().build()?;
//! let manager = SubscriptionManager::new(store, SystemClock, catalog, config);
//! ```

pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod ledger;
pub mod period;
pub mod quota;
pub mod storage;
pub mod subscription;
pub mod validation;

pub use catalog::{Plan, PlanCatalog, PlanFeatures, PlanLimits, UNLIMITED};
pub use clock::{Clock, SystemClock};
pub use config::{ConfigBuilder, EngineConfig, LoggingConfig};
pub use error::{BillingError, Result};
pub use ledger::{HistoryAction, HistoryRecord, PaymentRecord, PaymentStatus};
pub use period::{initial_period, BillingCycle, InitialPeriod};
pub use quota::{QuotaDecision, QuotaEvaluator, ResourceKind};
pub use storage::{BillingStore, PaidMarker};
pub use subscription::{
    CreateSubscriptionRequest, PlanChange, RecordPaymentRequest, Subscription, SubscriptionInfo,
    SubscriptionManager, SubscriptionPatch, SubscriptionStatus,
};

/// Initialize the global tracing subscriber from logging configuration.
///
/// `RUST_LOG` overrides the configured level when set. Safe to call more
/// than once; later calls are no-ops.
pub fn init_tracing(logging: &LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.clone()));

    if logging.json {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}
