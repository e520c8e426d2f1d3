//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Store Ports
//!
//! - `SubscriptionRepository` - Subscription rows, one per user
//! - `ProfileRepository` - Profiles with write-once referral and customer fields
//! - `RewardLedger` - Exactly-once referral payouts
//!
//! ## External Ports
//!
//! - `PaymentGateway` - Customers, subscriptions, and payments at the processor
//! - `SessionValidator` - Bearer token validation

mod payment_gateway;
mod profile_repository;
mod reward_ledger;
mod session_validator;
mod subscription_repository;

pub use payment_gateway::{
    CreateCustomerRequest, CreateSubscriptionRequest, CreatedSubscription, GatewayCustomer,
    GatewayError, GatewayErrorCode, GatewayPayment, GatewaySubscription,
    GatewaySubscriptionStatus, PaymentGateway, PaymentStatus, UpdateCustomerRequest,
};
pub use profile_repository::ProfileRepository;
pub use reward_ledger::{RewardApplication, RewardLedger};
pub use session_validator::SessionValidator;
pub use subscription_repository::{AppliedEvent, SubscriptionRepository};
