//! Axum router configuration for billing endpoints.

use axum::{
    routing::{get, post, put},
    Router,
};

use super::handlers::{
    cancel_subscription, handle_gateway_webhook, list_invoices, start_checkout, update_tax_id,
    BillingAppState,
};

/// Create the billing API router.
///
/// # Routes (require authentication)
/// - `POST /api/billing/checkout` - Start checkout for a plan
/// - `GET /api/billing/invoices` - Open invoices and subscription status
/// - `POST /api/billing/cancel` - Cancel auto-renewal
/// - `PUT /api/billing/tax-id` - Set CPF/CNPJ
pub fn billing_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/api/billing/checkout", post(start_checkout))
        .route("/api/billing/invoices", get(list_invoices))
        .route("/api/billing/cancel", post(cancel_subscription))
        .route("/api/billing/tax-id", put(update_tax_id))
}

/// Create the gateway webhook router.
///
/// Separate from the user routes because deliveries carry no bearer token;
/// they are checked against the optional shared webhook token instead.
///
/// # Routes
/// - `POST /api/webhooks/gateway` - Payment events from the gateway
pub fn webhook_routes() -> Router<BillingAppState> {
    Router::new().route("/api/webhooks/gateway", post(handle_gateway_webhook))
}
