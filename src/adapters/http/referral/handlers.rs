//! HTTP handlers for referral endpoints.

use std::sync::Arc;

use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::adapters::http::error::ErrorResponse;
use crate::adapters::http::middleware::RequireAuth;
use crate::application::handlers::referral::{
    ApplyReferralCodeCommand, ApplyReferralCodeHandler, GetReferralSummaryHandler,
    GetReferralSummaryQuery,
};
use crate::domain::referral::ReferralError;
use crate::ports::{ProfileRepository, RewardLedger};

use super::dto::{ApplyReferralRequest, ApplyReferralResponse, ReferralSummaryResponse};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct ReferralAppState {
    pub profiles: Arc<dyn ProfileRepository>,
    pub ledger: Arc<dyn RewardLedger>,
}

impl ReferralAppState {
    pub fn apply_code_handler(&self) -> ApplyReferralCodeHandler {
        ApplyReferralCodeHandler::new(self.profiles.clone())
    }

    pub fn summary_handler(&self) -> GetReferralSummaryHandler {
        GetReferralSummaryHandler::new(self.profiles.clone(), self.ledger.clone())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/referral - Own referral code and payout totals
pub async fn get_referral_summary(
    State(state): State<ReferralAppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, ReferralApiError> {
    let result = state
        .summary_handler()
        .handle(GetReferralSummaryQuery { user })
        .await?;

    Ok(Json(ReferralSummaryResponse::from(result)))
}

/// POST /api/referral/apply - Record who referred the current user
pub async fn apply_referral_code(
    State(state): State<ReferralAppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<ApplyReferralRequest>,
) -> Result<impl IntoResponse, ReferralApiError> {
    let result = state
        .apply_code_handler()
        .handle(ApplyReferralCodeCommand {
            user,
            code: request.code,
        })
        .await?;

    Ok(Json(ApplyReferralResponse::from(result)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts referral errors to HTTP responses.
#[derive(Debug)]
pub struct ReferralApiError(ReferralError);

impl From<ReferralError> for ReferralApiError {
    fn from(err: ReferralError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ReferralApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self.0 {
            ReferralError::ProfileNotFound(_) => (StatusCode::NOT_FOUND, "Profile not found"),
            ReferralError::CodeNotFound(_) => (StatusCode::NOT_FOUND, "Referral code not found"),
            ReferralError::AlreadyReferred(_) => {
                (StatusCode::CONFLICT, "A referral code was already applied")
            }
            ReferralError::SelfReferral => {
                (StatusCode::BAD_REQUEST, "You cannot use your own referral code")
            }
            ReferralError::ValidationFailed { .. } => {
                (StatusCode::BAD_REQUEST, "Invalid referral code")
            }
            ReferralError::Infrastructure(_) => {
                tracing::error!(error = %self.0.message(), "referral request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong, please try again",
                )
            }
        };

        let body = ErrorResponse::new(self.0.code(), message);
        (status, Json(body)).into_response()
    }
}
