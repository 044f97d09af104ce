//! Billing period arithmetic.
//!
//! The only place calendar math happens. Pure functions of `now`, so the
//! state machine stays testable without a real clock.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::subscription::SubscriptionStatus;

/// Billing recurrence for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    Monthly,
    Yearly,
}

impl BillingCycle {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// Calendar length of one period starting at `from`.
    #[must_use]
    pub fn period_end(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Monthly => from + Months::new(1),
            Self::Yearly => from + Months::new(12),
        }
    }
}

impl std::fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Initial period boundaries for a new subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitialPeriod {
    pub status: SubscriptionStatus,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

/// Compute the opening period for a subscription created at `now`.
///
/// A trial is only granted when requested and the plan actually offers
/// trial days; in that case the trial end doubles as the period end.
/// Otherwise the subscription starts Active with one calendar month or
/// year of runway.
#[must_use]
pub fn initial_period(
    now: DateTime<Utc>,
    cycle: BillingCycle,
    start_trial: bool,
    trial_days: u32,
) -> InitialPeriod {
    if start_trial && trial_days > 0 {
        let trial_ends_at = now + Duration::days(i64::from(trial_days));
        return InitialPeriod {
            status: SubscriptionStatus::Trial,
            trial_ends_at: Some(trial_ends_at),
            period_start: now,
            period_end: trial_ends_at,
        };
    }

    InitialPeriod {
        status: SubscriptionStatus::Active,
        trial_ends_at: None,
        period_start: now,
        period_end: cycle.period_end(now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 10, 30, 0).unwrap()
    }

    #[test]
    fn trial_period_uses_trial_days() {
        let now = at(2024, 6, 1);
        let period = initial_period(now, BillingCycle::Monthly, true, 14);

        assert_eq!(period.status, SubscriptionStatus::Trial);
        assert_eq!(period.trial_ends_at, Some(now + Duration::days(14)));
        assert_eq!(period.period_start, now);
        assert_eq!(period.period_end, now + Duration::days(14));
    }

    #[test]
    fn trial_requested_but_plan_has_no_trial_days() {
        let now = at(2024, 6, 1);
        let period = initial_period(now, BillingCycle::Monthly, true, 0);

        assert_eq!(period.status, SubscriptionStatus::Active);
        assert_eq!(period.trial_ends_at, None);
        assert_eq!(period.period_end, at(2024, 7, 1));
    }

    #[test]
    fn monthly_period_is_one_calendar_month() {
        let now = at(2024, 1, 31);
        let period = initial_period(now, BillingCycle::Monthly, false, 14);

        assert_eq!(period.status, SubscriptionStatus::Active);
        // chrono clamps to the last day of February.
        assert_eq!(period.period_end, Utc.with_ymd_and_hms(2024, 2, 29, 10, 30, 0).unwrap());
        assert!(period.period_end > period.period_start);
    }

    #[test]
    fn yearly_period_is_one_calendar_year() {
        let now = at(2024, 6, 15);
        let period = initial_period(now, BillingCycle::Yearly, false, 0);

        assert_eq!(period.period_end, at(2025, 6, 15));
        assert!(period.period_end > period.period_start);
    }

    #[test]
    fn billing_cycle_strings() {
        assert_eq!(BillingCycle::Monthly.as_str(), "monthly");
        assert_eq!(BillingCycle::Yearly.as_str(), "yearly");
    }
}
