//! HTTP DTOs for referral endpoints.

use serde::{Deserialize, Serialize};

use crate::application::handlers::referral::{ApplyReferralCodeResult, GetReferralSummaryResult};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct ApplyReferralRequest {
    /// Referral code of another user. Case and surrounding whitespace are ignored.
    pub code: String,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReferralResponse {
    pub success: bool,
    pub referred_by: String,
}

impl From<ApplyReferralCodeResult> for ApplyReferralResponse {
    fn from(result: ApplyReferralCodeResult) -> Self {
        Self {
            success: true,
            referred_by: result.referred_by.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralSummaryResponse {
    pub referral_code: String,
    pub rewards_granted: usize,
    pub total_reward_days: i64,
}

impl From<GetReferralSummaryResult> for ReferralSummaryResponse {
    fn from(result: GetReferralSummaryResult) -> Self {
        Self {
            referral_code: result.referral_code.as_str().to_string(),
            rewards_granted: result.rewards_granted,
            total_reward_days: result.total_reward_days,
        }
    }
}
