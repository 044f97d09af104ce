//! Billing-specific error types.
//!
//! Provides granular error types for subscription and quota operations,
//! enabling better error handling and more informative error messages for
//! API consumers.

use uuid::Uuid;

use crate::quota::ResourceKind;

/// Convenience result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BillingError>;

/// Errors surfaced by the subscription engine.
///
/// Every variant carries enough context (user id, plan code, resource kind)
/// for a caller to render a user-facing message; none are swallowed
/// internally.
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    /// The specified plan code or id is not in the catalog.
    #[error("plan not found: {code}")]
    PlanNotFound { code: String },

    /// No live (trial/active) subscription exists for the user.
    #[error("no live subscription for user {user_id}")]
    SubscriptionNotFound { user_id: Uuid },

    /// The subscription row itself is missing.
    #[error("subscription not found: {subscription_id}")]
    UnknownSubscription { subscription_id: Uuid },

    /// The user already has a live subscription; at most one Trial/Active
    /// row may exist per user.
    #[error("user {user_id} already has a live subscription")]
    DuplicateSubscription { user_id: Uuid },

    /// A quota check was denied. Carries the plan that would satisfy the
    /// request, when one exists. Callers may treat this as a normal
    /// decision outcome rather than a hard failure.
    #[error("quota exceeded for {resource}: {current} used of {limit}")]
    InsufficientQuota {
        resource: ResourceKind,
        current: i64,
        limit: i64,
        required_plan: Option<String>,
    },

    /// The caller supplied an invalid argument (non-positive count, bad
    /// plan code format, etc.).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A store call timed out or the connection failed. Safe for the
    /// caller to retry; the engine never retries across a multi-step
    /// transaction boundary itself.
    #[error("transient store error: {0}")]
    Transient(#[source] anyhow::Error),

    /// An unexpected internal failure.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BillingError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn transient(err: impl Into<anyhow::Error>) -> Self {
        Self::Transient(err.into())
    }

    /// Check if this is a client error (maps to a 4xx at the edge).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::PlanNotFound { .. }
                | Self::SubscriptionNotFound { .. }
                | Self::UnknownSubscription { .. }
                | Self::DuplicateSubscription { .. }
                | Self::InsufficientQuota { .. }
                | Self::InvalidArgument(_)
        )
    }

    /// Check if this error is safe for the caller to retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
