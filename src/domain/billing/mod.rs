//! Billing domain module.
//!
//! Subscription lifecycle, plans, and gateway payment events.
//!
//! # Module Structure
//!
//! - `subscription` - Subscription aggregate and reconciliation rules
//! - `status` - SubscriptionStatus state machine
//! - `plan` - Plan keys and the injected price catalog
//! - `gateway_event` - Validated gateway payment events
//! - `errors` - BillingError

mod errors;
mod gateway_event;
mod plan;
mod status;
mod subscription;

pub use errors::BillingError;
pub use gateway_event::{GatewayEvent, GatewayEventKind};
pub use plan::{Plan, PlanCatalog, PlanPrice};
pub use status::SubscriptionStatus;
pub use subscription::{EventOutcome, Subscription, PAID_PERIOD_DAYS};
