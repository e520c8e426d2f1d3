//! Referral handlers.
//!
//! ## Commands
//! - Granting the one-time referral reward after a confirmed payment
//! - Applying a referral code to the current user
//!
//! ## Queries
//! - Referral code and payout summary

mod apply_referral_code;
mod get_referral_summary;
mod grant_referral_reward;

// Commands
pub use apply_referral_code::{ApplyReferralCodeCommand, ApplyReferralCodeHandler, ApplyReferralCodeResult};
pub use grant_referral_reward::{GrantReferralRewardCommand, GrantReferralRewardHandler};

// Queries
pub use get_referral_summary::{GetReferralSummaryHandler, GetReferralSummaryQuery, GetReferralSummaryResult};
