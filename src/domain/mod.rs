//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (ids, timestamps, errors, auth)
//! - `billing` - Subscription lifecycle and gateway reconciliation rules
//! - `referral` - Profiles, referral codes, and the reward ledger

pub mod billing;
pub mod foundation;
pub mod referral;
