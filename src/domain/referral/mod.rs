//! Referral domain module.
//!
//! Profiles carry the referral relationship; the reward ledger records
//! each payout exactly once per (referrer, referred) pair.

mod errors;
mod profile;
mod reward;

pub use errors::ReferralError;
pub use profile::{Profile, ReferralCode, TaxId};
pub use reward::{ReferralReward, RewardOutcome, SkipReason, REWARD_DAYS};
