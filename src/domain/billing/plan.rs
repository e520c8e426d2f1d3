//! Plans and their prices.
//!
//! Prices are not hardcoded: a `PlanCatalog` is built from configuration and
//! injected wherever a price is needed.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;
use serde::{Deserialize, Serialize};

/// Subscription plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    /// Default plan for users who never checked out.
    Trial,
    Light,
    Pro,
    Vip,
}

impl Plan {
    pub const ALL: [Plan; 4] = [Plan::Trial, Plan::Light, Plan::Pro, Plan::Vip];

    /// Storage and wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Trial => "trial",
            Plan::Light => "light",
            Plan::Pro => "pro",
            Plan::Vip => "vip",
        }
    }

    /// Whether the plan can be bought through checkout.
    pub fn is_purchasable(&self) -> bool {
        !matches!(self, Plan::Trial)
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|plan| plan.as_str() == s)
            .ok_or_else(|| ValidationError::unknown_value("plan", s))
    }
}

/// Recurring price of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanPrice {
    /// Monthly charge in cents.
    pub value_cents: i64,

    /// Description shown on the gateway invoice.
    pub description: String,
}

impl PlanPrice {
    pub fn new(value_cents: i64, description: impl Into<String>) -> Self {
        Self {
            value_cents,
            description: description.into(),
        }
    }
}

/// Price table keyed by plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanCatalog {
    prices: HashMap<Plan, PlanPrice>,
}

impl PlanCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the price for a plan.
    pub fn with_price(mut self, plan: Plan, price: PlanPrice) -> Self {
        self.prices.insert(plan, price);
        self
    }

    pub fn price_for(&self, plan: Plan) -> Option<&PlanPrice> {
        self.prices.get(&plan)
    }

    /// Resolves a client-supplied plan key to a purchasable, priced plan.
    ///
    /// Unknown keys, `trial`, and plans without a configured price are all
    /// rejected as `plan` validation errors.
    pub fn resolve(&self, key: &str) -> Result<(Plan, &PlanPrice), ValidationError> {
        let key = key.trim().to_ascii_lowercase();
        let plan: Plan = key.parse()?;
        if !plan.is_purchasable() {
            return Err(ValidationError::unknown_value("plan", key));
        }
        self.price_for(plan)
            .map(|price| (plan, price))
            .ok_or_else(|| ValidationError::unknown_value("plan", key))
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}
