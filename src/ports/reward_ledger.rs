//! Referral reward ledger port.
//!
//! The uniqueness of (referrer, referred) in storage is the only guarantee
//! that a reward is paid once. `has_reward` is an early exit for the common
//! case, never a substitute for the constraint.

use crate::domain::foundation::{DomainError, Timestamp, UserId};
use crate::domain::referral::ReferralReward;
use async_trait::async_trait;

/// Result of attempting to record a reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardApplication {
    /// Ledger row written and referrer extended through `new_period_end`.
    Granted { new_period_end: Timestamp },

    /// The pair already had a ledger row; nothing changed.
    AlreadyGranted,
}

#[async_trait]
pub trait RewardLedger: Send + Sync {
    async fn has_reward(
        &self,
        referrer_id: &UserId,
        referred_user_id: &UserId,
    ) -> Result<bool, DomainError>;

    /// Atomically inserts the ledger row and extends the referrer's
    /// subscription by `reward.reward_days`.
    ///
    /// Both writes happen in one transaction. A uniqueness conflict on the
    /// ledger row rolls everything back and yields `AlreadyGranted`. A
    /// referrer without a subscription row gets one created.
    async fn apply_reward(&self, reward: &ReferralReward) -> Result<RewardApplication, DomainError>;

    /// All rewards paid to a referrer, newest first.
    async fn list_for_referrer(&self, referrer_id: &UserId) -> Result<Vec<ReferralReward>, DomainError>;
}
