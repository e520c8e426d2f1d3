//! Referral HTTP adapter.

mod dto;
mod handlers;
mod routes;

pub use dto::{ApplyReferralRequest, ApplyReferralResponse, ReferralSummaryResponse};
pub use handlers::{ReferralApiError, ReferralAppState};
pub use routes::referral_routes;
