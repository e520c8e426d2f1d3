//! HTTP handlers for billing endpoints.
//!
//! These handlers connect axum routes to the billing command and query handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

use crate::adapters::asaas::{AsaasWebhookPayload, ParsedWebhook, WebhookTokenVerifier, WEBHOOK_TOKEN_HEADER};
use crate::adapters::http::error::ErrorResponse;
use crate::adapters::http::middleware::RequireAuth;
use crate::application::handlers::billing::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, ListInvoicesHandler, ListInvoicesQuery,
    ReconcileOutcome, ReconcilePaymentEventCommand, ReconcilePaymentEventHandler,
    StartCheckoutCommand, StartCheckoutHandler, SyncSubscriptionHandler, UpdateTaxIdCommand,
    UpdateTaxIdHandler,
};
use crate::application::handlers::referral::GrantReferralRewardHandler;
use crate::domain::billing::{BillingError, PlanCatalog};
use crate::domain::foundation::{ErrorCode, ValidationError};
use crate::ports::{PaymentGateway, ProfileRepository, RewardLedger, SubscriptionRepository};

use super::dto::{
    CancelResponse, CheckoutRequest, CheckoutResponse, InvoiceView, InvoicesResponse,
    SubscriptionView, UpdateTaxIdRequest, UpdateTaxIdResponse, WebhookAck,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for billing routes. Cloned per request; every field is cheap to clone.
#[derive(Clone)]
pub struct BillingAppState {
    pub profiles: Arc<dyn ProfileRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub ledger: Arc<dyn RewardLedger>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub catalog: Arc<PlanCatalog>,
    pub webhook_verifier: WebhookTokenVerifier,
}

impl BillingAppState {
    /// Create handlers on demand from the shared state.
    pub fn reconcile_handler(&self) -> ReconcilePaymentEventHandler {
        let rewards = GrantReferralRewardHandler::new(self.profiles.clone(), self.ledger.clone());
        ReconcilePaymentEventHandler::new(self.subscriptions.clone(), Arc::new(rewards))
    }

    pub fn checkout_handler(&self) -> StartCheckoutHandler {
        StartCheckoutHandler::new(
            self.profiles.clone(),
            self.subscriptions.clone(),
            self.gateway.clone(),
            self.catalog.clone(),
        )
    }

    pub fn list_invoices_handler(&self) -> ListInvoicesHandler {
        let sync = SyncSubscriptionHandler::new(self.subscriptions.clone(), self.gateway.clone());
        ListInvoicesHandler::new(
            self.profiles.clone(),
            self.subscriptions.clone(),
            self.gateway.clone(),
            Arc::new(sync),
        )
    }

    pub fn cancel_handler(&self) -> CancelSubscriptionHandler {
        CancelSubscriptionHandler::new(self.subscriptions.clone(), self.gateway.clone())
    }

    pub fn update_tax_id_handler(&self) -> UpdateTaxIdHandler {
        UpdateTaxIdHandler::new(self.profiles.clone(), self.gateway.clone())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook Handler
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/webhooks/gateway - Reconcile a gateway payment event
///
/// Unknown events and unknown subscriptions are acknowledged so the gateway
/// stops redelivering them. Any non-2xx response makes the gateway retry.
pub async fn handle_gateway_webhook(
    State(state): State<BillingAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, WebhookRejection> {
    let token = headers
        .get(WEBHOOK_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());
    state
        .webhook_verifier
        .verify(token)
        .map_err(|_| WebhookRejection::Unauthorized)?;

    let parsed = AsaasWebhookPayload::from_slice(&body)
        .and_then(AsaasWebhookPayload::into_event)
        .map_err(WebhookRejection::Malformed)?;

    let event = match parsed {
        ParsedWebhook::Event(event) => event,
        ParsedWebhook::Ignored(reason) => {
            tracing::info!(?reason, "gateway webhook acknowledged without changes");
            return Ok(Json(WebhookAck::received()));
        }
    };

    let payment_id = event.payment_id.clone();
    let outcome = state
        .reconcile_handler()
        .handle(ReconcilePaymentEventCommand { event })
        .await?;

    match &outcome {
        ReconcileOutcome::Activated { user_id, reward, .. } => {
            tracing::info!(%payment_id, %user_id, reward_granted = reward.granted(), "payment reconciled");
        }
        other => tracing::debug!(%payment_id, outcome = ?other, "payment event reconciled"),
    }

    Ok(Json(WebhookAck::received()))
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers (POST/PUT endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/billing/checkout - Start checkout for a plan
pub async fn start_checkout(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let handler = state.checkout_handler();
    let cmd = StartCheckoutCommand {
        user,
        plan: request.plan,
        billing_type: request.billing_type,
    };

    let result = handler.handle(cmd).await?;

    Ok(Json(CheckoutResponse::from(result)))
}

/// POST /api/billing/cancel - Cancel auto-renewal
pub async fn cancel_subscription(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, BillingApiError> {
    let handler = state.cancel_handler();
    let result = handler
        .handle(CancelSubscriptionCommand { user_id: user.id })
        .await?;

    Ok(Json(CancelResponse::from(result)))
}

/// PUT /api/billing/tax-id - Set the CPF/CNPJ used on invoices
pub async fn update_tax_id(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<UpdateTaxIdRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let handler = state.update_tax_id_handler();
    let result = handler
        .handle(UpdateTaxIdCommand {
            user,
            tax_id: request.tax_id,
        })
        .await?;

    Ok(Json(UpdateTaxIdResponse::from(result)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/billing/invoices - Open invoices plus current subscription status
pub async fn list_invoices(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, BillingApiError> {
    let handler = state.list_invoices_handler();
    let result = handler.handle(ListInvoicesQuery { user_id: user.id }).await?;

    let response = InvoicesResponse {
        subscription: result.subscription.map(SubscriptionView::from),
        invoices: result.invoices.into_iter().map(InvoiceView::from).collect(),
    };

    Ok(Json(response))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts billing errors to HTTP responses.
#[derive(Debug)]
pub struct BillingApiError(BillingError);

impl From<BillingError> for BillingApiError {
    fn from(err: BillingError) -> Self {
        Self(err)
    }
}

impl From<crate::domain::foundation::DomainError> for BillingApiError {
    fn from(err: crate::domain::foundation::DomainError) -> Self {
        Self(BillingError::from(err))
    }
}

impl IntoResponse for BillingApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self.0 {
            BillingError::SubscriptionNotFound(_) => {
                (StatusCode::NOT_FOUND, "No subscription found".to_string())
            }
            BillingError::InvalidPlan(_) => (StatusCode::BAD_REQUEST, "Unknown plan".to_string()),
            BillingError::ValidationFailed { .. } => (StatusCode::BAD_REQUEST, self.0.message()),
            BillingError::InvalidState { .. } => (
                StatusCode::CONFLICT,
                "Subscription cannot change from its current status".to_string(),
            ),
            BillingError::Upstream { .. } => {
                tracing::warn!(error = %self.0.message(), "payment gateway failure");
                (
                    StatusCode::BAD_GATEWAY,
                    "Payment provider unavailable, please try again".to_string(),
                )
            }
            BillingError::Infrastructure(_) => {
                tracing::error!(error = %self.0.message(), "billing request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong, please try again".to_string(),
                )
            }
        };

        let body = ErrorResponse::new(self.0.code(), message);
        (status, Json(body)).into_response()
    }
}

/// Rejection for webhook deliveries.
#[derive(Debug)]
pub enum WebhookRejection {
    /// Token missing or wrong. Nothing was applied.
    Unauthorized,
    /// Body could not be turned into an event. Nothing was applied.
    Malformed(ValidationError),
    /// Reconciliation failed; the gateway will redeliver.
    Failed(BillingError),
}

impl From<BillingError> for WebhookRejection {
    fn from(err: BillingError) -> Self {
        Self::Failed(err)
    }
}

impl IntoResponse for WebhookRejection {
    fn into_response(self) -> axum::response::Response {
        match self {
            WebhookRejection::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new(ErrorCode::Unauthorized, "Invalid webhook token")),
            )
                .into_response(),
            WebhookRejection::Malformed(err) => {
                tracing::warn!(field = err.field(), error = %err, "malformed gateway webhook");
                (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse::new(ErrorCode::MalformedEvent, err.to_string())),
                )
                    .into_response()
            }
            WebhookRejection::Failed(err) => BillingApiError(err).into_response(),
        }
    }
}
