//! Subscription records and the access rule.
//!
//! A subscription record links a user to a payment-provider subscription.
//! Records are written exclusively by the webhook handler in
//! `pitchhub-billing`; the request-serving path only ever reads them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::user::UserId;

/// Payment-provider subscription status
///
/// Exactly `Active` and `Trialing` grant access to protected paths; every
/// other status is treated as "no access".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    Canceled,
    PastDue,
    Incomplete,
    IncompleteExpired,
    Unpaid,
    Paused,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::IncompleteExpired => "incomplete_expired",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Paused => "paused",
        }
    }

    /// Parse the provider's lowercase wire string. Unknown strings map to
    /// `Canceled` so they never grant access.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "active" => SubscriptionStatus::Active,
            "trialing" => SubscriptionStatus::Trialing,
            "past_due" => SubscriptionStatus::PastDue,
            "incomplete" => SubscriptionStatus::Incomplete,
            "incomplete_expired" => SubscriptionStatus::IncompleteExpired,
            "unpaid" => SubscriptionStatus::Unpaid,
            "paused" => SubscriptionStatus::Paused,
            _ => SubscriptionStatus::Canceled,
        }
    }

    /// Whether this status admits the user to protected paths
    pub fn grants_access(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active | SubscriptionStatus::Trialing
        )
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A subscription record
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Subscription {
    /// Owning user
    pub user_id: UserId,

    /// Payment-provider subscription id
    pub subscription_id: String,

    /// Current status
    pub status: SubscriptionStatus,

    /// Current billing period start
    pub current_period_start: Option<DateTime<Utc>>,

    /// Current billing period end
    pub current_period_end: Option<DateTime<Utc>>,

    /// Trial end, when the subscription started with a trial
    pub trial_end: Option<DateTime<Utc>>,

    /// Set when the user scheduled a cancellation for period end
    pub cancel_at_period_end: bool,

    /// Provider price id the subscription was created with
    pub price_id: Option<String>,

    /// Raw provider metadata blob
    pub metadata: serde_json::Value,

    /// Last write timestamp
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Create a new record with only the identifying fields set
    pub fn new(user_id: UserId, subscription_id: impl Into<String>, status: SubscriptionStatus) -> Self {
        Self {
            user_id,
            subscription_id: subscription_id.into(),
            status,
            current_period_start: None,
            current_period_end: None,
            trial_end: None,
            cancel_at_period_end: false,
            price_id: None,
            metadata: serde_json::Value::Null,
            updated_at: Utc::now(),
        }
    }

    /// Whether this record admits the user to protected paths
    pub fn grants_access(&self) -> bool {
        self.status.grants_access()
    }
}

/// Subscription plan tiers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Solo,
    Studio,
    Agency,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Solo => "solo",
            Plan::Studio => "studio",
            Plan::Agency => "agency",
        }
    }

    /// Parse a plan name; unknown names fall back to the entry tier
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "studio" => Plan::Studio,
            "agency" => Plan::Agency,
            _ => Plan::Solo,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Plan::Solo => "Solo",
            Plan::Studio => "Studio",
            Plan::Agency => "Agency",
        }
    }

    pub const ALL: [Plan; 3] = [Plan::Solo, Plan::Studio, Plan::Agency];
}

impl Default for Plan {
    fn default() -> Self {
        Plan::Solo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_statuses() {
        assert!(SubscriptionStatus::Active.grants_access());
        assert!(SubscriptionStatus::Trialing.grants_access());
        assert!(!SubscriptionStatus::Canceled.grants_access());
        assert!(!SubscriptionStatus::PastDue.grants_access());
        assert!(!SubscriptionStatus::Incomplete.grants_access());
        assert!(!SubscriptionStatus::IncompleteExpired.grants_access());
        assert!(!SubscriptionStatus::Unpaid.grants_access());
        assert!(!SubscriptionStatus::Paused.grants_access());
    }

    #[test]
    fn test_unknown_status_denies_access() {
        let status = SubscriptionStatus::from_str("some_future_status");
        assert!(!status.grants_access());
    }

    #[test]
    fn test_status_wire_roundtrip() {
        for status in [
            SubscriptionStatus::Active,
            SubscriptionStatus::Trialing,
            SubscriptionStatus::PastDue,
            SubscriptionStatus::IncompleteExpired,
        ] {
            assert_eq!(SubscriptionStatus::from_str(status.as_str()), status);
        }
    }

    #[test]
    fn test_new_subscription_carries_status() {
        let sub = Subscription::new(
            UserId::new("usr_1"),
            "sub_123",
            SubscriptionStatus::Trialing,
        );
        assert!(sub.grants_access());
        assert!(!sub.cancel_at_period_end);
    }

    #[test]
    fn test_plan_parse_defaults_to_solo() {
        assert_eq!(Plan::from_str("studio"), Plan::Studio);
        assert_eq!(Plan::from_str("enterprise"), Plan::Solo);
    }
}
