//! Append-only ledgers: subscription history and payment records.
//!
//! Both record types are written exclusively as side effects of state
//! machine operations and are never read back for decision-making here;
//! reporting over them is an external collaborator's concern. Records
//! outlive their subscription for audit purposes and are never deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of subscription transition a history record captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Created,
    Upgraded,
    Downgraded,
    Canceled,
    Renewed,
    Expired,
}

impl HistoryAction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Upgraded => "upgraded",
            Self::Downgraded => "downgraded",
            Self::Canceled => "canceled",
            Self::Renewed => "renewed",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One append-only record per subscription transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub user_id: Uuid,
    pub action: HistoryAction,
    pub from_plan_id: Option<Uuid>,
    pub to_plan_id: Option<Uuid>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl HistoryRecord {
    /// Build a record for a transition happening at `created_at`.
    #[must_use]
    pub fn new(
        subscription_id: Uuid,
        user_id: Uuid,
        action: HistoryAction,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            subscription_id,
            user_id,
            action,
            from_plan_id: None,
            to_plan_id: None,
            reason: None,
            created_at,
        }
    }

    #[must_use]
    pub fn with_plans(mut self, from: Option<Uuid>, to: Option<Uuid>) -> Self {
        self.from_plan_id = from;
        self.to_plan_id = to;
        self
    }

    #[must_use]
    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }
}

/// Outcome of a payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One record per payment attempt against a subscription.
///
/// Never mutated; a later attempt simply appends a newer record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub user_id: Uuid,
    /// External gateway reference for the payment.
    pub payment_id: String,
    /// Amount in minor currency units.
    pub amount: i64,
    pub currency: String,
    /// The billing period this payment covers.
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
}
