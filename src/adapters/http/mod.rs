//! HTTP adapters - REST API implementations.
//!
//! Each domain module has its own HTTP adapter. `app_router` assembles
//! them behind the bearer-token middleware; the gateway webhook and the
//! health check stay outside it.

pub mod billing;
pub mod error;
pub mod middleware;
pub mod referral;

use axum::{routing::get, Json, Router};

pub use billing::{billing_routes, webhook_routes, BillingAppState};
pub use error::ErrorResponse;
pub use middleware::{auth_middleware, AuthState, RequireAuth};
pub use referral::{referral_routes, ReferralAppState};

/// Builds the full application router.
///
/// # Routes
/// - `GET /health` - Liveness, unauthenticated
/// - `POST /api/webhooks/gateway` - Gateway events, webhook token
/// - `/api/billing/*`, `/api/referral*` - Bearer token
pub fn app_router(billing: BillingAppState, referral: ReferralAppState, auth: AuthState) -> Router {
    let billing_api: Router = billing_routes().with_state(billing.clone());
    let referral_api: Router = referral_routes().with_state(referral);
    let webhooks: Router = webhook_routes().with_state(billing);

    let user_routes = billing_api
        .merge(referral_api)
        .layer(axum::middleware::from_fn_with_state(auth, auth_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(webhooks)
        .merge(user_routes)
}

/// GET /health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
