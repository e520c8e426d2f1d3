//! Referral reward ledger types.

use crate::domain::foundation::{RewardId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

use super::ReferralError;

/// Days added to the referrer's subscription per successful referral.
pub const REWARD_DAYS: i64 = 30;

/// Append-only ledger row. At most one per (referrer, referred) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralReward {
    pub id: RewardId,
    pub referrer_id: UserId,
    pub referred_user_id: UserId,
    pub reward_days: i64,
    pub granted_at: Timestamp,
}

impl ReferralReward {
    /// Builds the ledger row for a grant happening at `now`.
    pub fn new(
        referrer_id: UserId,
        referred_user_id: UserId,
        now: Timestamp,
    ) -> Result<Self, ReferralError> {
        if referrer_id == referred_user_id {
            return Err(ReferralError::SelfReferral);
        }
        Ok(Self {
            id: RewardId::new(),
            referrer_id,
            referred_user_id,
            reward_days: REWARD_DAYS,
            granted_at: now,
        })
    }
}

/// Why a grant attempt changed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoReferrer,
    ReferrerNotFound,
    SelfReferral,
    AlreadyGranted,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoReferrer => "no_referrer",
            SkipReason::ReferrerNotFound => "referrer_not_found",
            SkipReason::SelfReferral => "self_referral",
            SkipReason::AlreadyGranted => "already_granted",
        }
    }
}

/// Result of one grant attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewardOutcome {
    Granted {
        referrer_id: UserId,
        new_period_end: Timestamp,
    },
    Skipped(SkipReason),
}

impl RewardOutcome {
    pub fn granted(&self) -> bool {
        matches!(self, RewardOutcome::Granted { .. })
    }

    pub fn reason(&self) -> Option<SkipReason> {
        match self {
            RewardOutcome::Granted { .. } => None,
            RewardOutcome::Skipped(reason) => Some(*reason),
        }
    }
}
