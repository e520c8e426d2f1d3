//! Subscription status state machine.
//!
//! The gateway is the source of truth for payment-driven states, so
//! `active`, `overdue` and `pending` are reachable from anywhere. Only
//! user cancellation and the initial `trial` state are constrained.

use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{StateMachine, ValidationError};
use serde::{Deserialize, Serialize};

/// Local subscription status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    /// Initial state for users who never paid. Only ever assigned at creation.
    Trial,

    /// Checkout started, awaiting the first payment on the current plan.
    Pending,

    /// Paid through `current_period_end`.
    Active,

    /// Auto-renewal revoked by the user. Access continues until period end.
    Canceled,

    /// The gateway reported a missed payment. Grace period applies.
    Overdue,
}

impl SubscriptionStatus {
    pub const ALL: [SubscriptionStatus; 5] = [
        SubscriptionStatus::Trial,
        SubscriptionStatus::Pending,
        SubscriptionStatus::Active,
        SubscriptionStatus::Canceled,
        SubscriptionStatus::Overdue,
    ];

    /// Storage and wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Trial => "trial",
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Overdue => "overdue",
        }
    }

    /// Whether this status can grant access while the paid period lasts.
    ///
    /// `overdue` and `canceled` are the grace-window states.
    pub fn within_paid_lifecycle(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active | SubscriptionStatus::Overdue | SubscriptionStatus::Canceled
        )
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ValidationError::unknown_value("status", s))
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        match target {
            Trial => false,
            Pending | Active | Overdue => true,
            Canceled => *self != Canceled,
        }
    }
}
