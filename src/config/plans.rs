//! Plan price table

use serde::Deserialize;

use crate::domain::billing::{Plan, PlanCatalog, PlanPrice};

use super::error::ValidationError;

/// Monthly price of one plan.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanPriceConfig {
    /// Amount in centavos
    pub value_cents: i64,

    /// Description shown on the gateway charge
    pub description: String,
}

/// Price table for every purchasable plan.
#[derive(Debug, Clone, Deserialize)]
pub struct PlansConfig {
    #[serde(default = "default_light")]
    pub light: PlanPriceConfig,

    #[serde(default = "default_pro")]
    pub pro: PlanPriceConfig,

    #[serde(default = "default_vip")]
    pub vip: PlanPriceConfig,
}

impl PlansConfig {
    /// Builds the catalog injected into checkout.
    pub fn to_catalog(&self) -> PlanCatalog {
        [
            (Plan::Light, &self.light),
            (Plan::Pro, &self.pro),
            (Plan::Vip, &self.vip),
        ]
        .into_iter()
        .fold(PlanCatalog::new(), |catalog, (plan, price)| {
            catalog.with_price(plan, PlanPrice::new(price.value_cents, price.description.clone()))
        })
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (name, price) in [("light", &self.light), ("pro", &self.pro), ("vip", &self.vip)] {
            if price.value_cents <= 0 {
                return Err(ValidationError::InvalidPlanPrice(name));
            }
        }
        Ok(())
    }
}

impl Default for PlansConfig {
    fn default() -> Self {
        Self {
            light: default_light(),
            pro: default_pro(),
            vip: default_vip(),
        }
    }
}

fn default_light() -> PlanPriceConfig {
    PlanPriceConfig {
        value_cents: 2990,
        description: "Plano Light - mensal".to_string(),
    }
}

fn default_pro() -> PlanPriceConfig {
    PlanPriceConfig {
        value_cents: 5990,
        description: "Plano Pro - mensal".to_string(),
    }
}

fn default_vip() -> PlanPriceConfig {
    PlanPriceConfig {
        value_cents: 9990,
        description: "Plano VIP - mensal".to_string(),
    }
}
