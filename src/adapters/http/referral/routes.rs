//! Axum router configuration for referral endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{apply_referral_code, get_referral_summary, ReferralAppState};

/// Create the referral API router.
///
/// # Routes (require authentication)
/// - `GET /api/referral` - Own code and payout totals
/// - `POST /api/referral/apply` - Apply another user's code
pub fn referral_routes() -> Router<ReferralAppState> {
    Router::new()
        .route("/api/referral", get(get_referral_summary))
        .route("/api/referral/apply", post(apply_referral_code))
}
