//! Gateway-reported payment events.
//!
//! Events arrive unordered and possibly duplicated. Only the kinds below
//! affect local state; everything else is acknowledged and dropped at the
//! boundary.

use crate::domain::foundation::Timestamp;
use serde::{Deserialize, Serialize};

/// Payment event kinds that drive reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayEventKind {
    PaymentConfirmed,
    PaymentReceived,
    PaymentOverdue,
}

impl GatewayEventKind {
    /// Parses the gateway's event name. Unrecognized names yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PAYMENT_CONFIRMED" => Some(Self::PaymentConfirmed),
            "PAYMENT_RECEIVED" => Some(Self::PaymentReceived),
            "PAYMENT_OVERDUE" => Some(Self::PaymentOverdue),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentConfirmed => "PAYMENT_CONFIRMED",
            Self::PaymentReceived => "PAYMENT_RECEIVED",
            Self::PaymentOverdue => "PAYMENT_OVERDUE",
        }
    }

    /// Confirmed and received are treated identically.
    pub fn is_settlement(&self) -> bool {
        matches!(self, Self::PaymentConfirmed | Self::PaymentReceived)
    }
}

/// A validated payment event for one gateway subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayEvent {
    pub kind: GatewayEventKind,
    pub payment_id: String,
    pub gateway_subscription_id: String,

    /// Payment date for settlements, creation date otherwise.
    pub occurred_at: Timestamp,
}

impl GatewayEvent {
    pub fn new(
        kind: GatewayEventKind,
        payment_id: impl Into<String>,
        gateway_subscription_id: impl Into<String>,
        occurred_at: Timestamp,
    ) -> Self {
        Self {
            kind,
            payment_id: payment_id.into(),
            gateway_subscription_id: gateway_subscription_id.into(),
            occurred_at,
        }
    }
}
