//! Foundation module - Shared domain primitives.
//!
//! Identifiers, time, errors and auth types used by the billing and
//! referral domains.

mod auth;
mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use auth::{AuthError, AuthenticatedUser};
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{RewardId, UserId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
