//! GetReferralSummaryHandler - Query for the user's referral code and payouts.

use std::sync::Arc;

use crate::application::handlers::profiles::ensure_profile;
use crate::domain::foundation::AuthenticatedUser;
use crate::domain::referral::{ReferralCode, ReferralError, ReferralReward};
use crate::ports::{ProfileRepository, RewardLedger};

#[derive(Debug, Clone)]
pub struct GetReferralSummaryQuery {
    pub user: AuthenticatedUser,
}

#[derive(Debug, Clone)]
pub struct GetReferralSummaryResult {
    pub referral_code: ReferralCode,
    pub rewards_granted: usize,
    pub total_reward_days: i64,

    /// Newest first.
    pub rewards: Vec<ReferralReward>,
}

pub struct GetReferralSummaryHandler {
    profiles: Arc<dyn ProfileRepository>,
    ledger: Arc<dyn RewardLedger>,
}

impl GetReferralSummaryHandler {
    pub fn new(profiles: Arc<dyn ProfileRepository>, ledger: Arc<dyn RewardLedger>) -> Self {
        Self { profiles, ledger }
    }

    pub async fn handle(&self, query: GetReferralSummaryQuery) -> Result<GetReferralSummaryResult, ReferralError> {
        let profile = ensure_profile(self.profiles.as_ref(), &query.user).await?;
        let rewards = self.ledger.list_for_referrer(&profile.user_id).await?;

        Ok(GetReferralSummaryResult {
            referral_code: profile.referral_code,
            rewards_granted: rewards.len(),
            total_reward_days: rewards.iter().map(|r| r.reward_days).sum(),
            rewards,
        })
    }
}
