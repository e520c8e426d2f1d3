//! GrantReferralRewardHandler - Pays the referrer once a referred user pays.

use std::sync::Arc;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::referral::{ReferralError, ReferralReward, RewardOutcome, SkipReason};
use crate::ports::{ProfileRepository, RewardApplication, RewardLedger};

/// Command to grant the reward owed for `referred_user_id`'s payment.
#[derive(Debug, Clone)]
pub struct GrantReferralRewardCommand {
    pub referred_user_id: UserId,
}

/// Handler for referral reward issuance.
///
/// The ledger's uniqueness on (referrer, referred) is what makes this
/// exactly-once; the `has_reward` read only short-circuits the common
/// duplicate. Ledger insert and referrer extension commit together.
pub struct GrantReferralRewardHandler {
    profiles: Arc<dyn ProfileRepository>,
    ledger: Arc<dyn RewardLedger>,
}

impl GrantReferralRewardHandler {
    pub fn new(profiles: Arc<dyn ProfileRepository>, ledger: Arc<dyn RewardLedger>) -> Self {
        Self { profiles, ledger }
    }

    pub async fn handle(&self, cmd: GrantReferralRewardCommand) -> Result<RewardOutcome, ReferralError> {
        let referred = cmd.referred_user_id;

        // 1. Who referred this user, if anyone
        let Some(code) = self
            .profiles
            .find_by_user_id(&referred)
            .await?
            .and_then(|profile| profile.referred_by)
        else {
            return Ok(RewardOutcome::Skipped(SkipReason::NoReferrer));
        };

        // 2. Resolve the code now, not when it was applied
        let Some(referrer) = self.profiles.find_by_referral_code(&code).await? else {
            tracing::warn!(user_id = %referred, referral_code = %code, "Referral code no longer resolves");
            return Ok(RewardOutcome::Skipped(SkipReason::ReferrerNotFound));
        };

        if referrer.user_id == referred {
            return Ok(RewardOutcome::Skipped(SkipReason::SelfReferral));
        }

        // 3. Fast path for redelivery
        if self.ledger.has_reward(&referrer.user_id, &referred).await? {
            return Ok(RewardOutcome::Skipped(SkipReason::AlreadyGranted));
        }

        // 4-6. Ledger row + extension, atomically
        let reward = ReferralReward::new(referrer.user_id.clone(), referred.clone(), Timestamp::now())?;
        match self.ledger.apply_reward(&reward).await? {
            RewardApplication::Granted { new_period_end } => {
                tracing::info!(
                    referrer_id = %reward.referrer_id,
                    referred_user_id = %referred,
                    new_period_end = %new_period_end.date_string(),
                    "Referral reward granted"
                );
                Ok(RewardOutcome::Granted {
                    referrer_id: reward.referrer_id,
                    new_period_end,
                })
            }
            RewardApplication::AlreadyGranted => {
                tracing::debug!(referred_user_id = %referred, "Referral reward lost race, already granted");
                Ok(RewardOutcome::Skipped(SkipReason::AlreadyGranted))
            }
        }
    }
}
