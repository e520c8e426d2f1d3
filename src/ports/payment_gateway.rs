//! Payment gateway port.
//!
//! Black-box contract with the external processor: customers,
//! subscriptions, and payments. Every call is bounded by a timeout in the
//! adapter; a timeout is reported as a failure and never retried here.
//! Redelivery is the webhook caller's job.

use crate::domain::billing::{BillingError, Plan};
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a customer record. Returns the gateway customer id.
    async fn create_customer(&self, request: CreateCustomerRequest) -> Result<GatewayCustomer, GatewayError>;

    /// Push updated customer data (currently the tax id).
    async fn update_customer(
        &self,
        customer_id: &str,
        request: UpdateCustomerRequest,
    ) -> Result<(), GatewayError>;

    /// Create a recurring monthly subscription.
    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<CreatedSubscription, GatewayError>;

    /// Current gateway view of a subscription.
    async fn get_subscription(&self, subscription_id: &str) -> Result<GatewaySubscription, GatewayError>;

    /// Payments of a customer whose status is one of `statuses`.
    async fn list_payments(
        &self,
        customer_id: &str,
        statuses: &[PaymentStatus],
    ) -> Result<Vec<GatewayPayment>, GatewayError>;

    /// Stop the subscription from generating new charges.
    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), GatewayError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCustomerRequest {
    /// Internal user id, sent as the gateway's external reference.
    pub user_id: UserId,
    pub name: String,
    pub email: Option<String>,
    pub tax_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayCustomer {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCustomerRequest {
    pub tax_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub customer_id: String,
    pub plan: Plan,
    pub value_cents: i64,
    pub description: String,

    /// Passed through untouched (e.g. `PIX`, `BOLETO`, `CREDIT_CARD`).
    pub billing_type: String,

    /// First charge date.
    pub next_due_date: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedSubscription {
    pub id: String,

    /// Where the user completes the first payment (invoice or bank slip).
    pub payment_url: Option<String>,
}

/// Gateway-side subscription status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewaySubscriptionStatus {
    Active,
    Inactive,
    Expired,
    Other(String),
}

impl GatewaySubscriptionStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "ACTIVE" => Self::Active,
            "INACTIVE" => Self::Inactive,
            "EXPIRED" => Self::Expired,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Pull-sync snapshot of a gateway subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySubscription {
    pub id: String,
    pub status: GatewaySubscriptionStatus,
    pub next_due_date: Option<Timestamp>,
}

/// Payment status filter values understood by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Overdue,
    Confirmed,
    Received,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Overdue => "OVERDUE",
            PaymentStatus::Confirmed => "CONFIRMED",
            PaymentStatus::Received => "RECEIVED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayPayment {
    pub id: String,
    pub status: String,
    pub value_cents: i64,
    pub due_date: Option<String>,
    pub invoice_url: Option<String>,
}

/// Errors from gateway operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayError {
    pub code: GatewayErrorCode,
    pub message: String,

    /// Whether the caller's own retry policy may reasonably retry.
    pub retryable: bool,
}

impl GatewayError {
    pub fn new(code: GatewayErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retryable: code.is_retryable(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::Timeout, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::NetworkError, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(GatewayErrorCode::NotFound, format!("{} not found", resource))
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::ProviderError, message)
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for GatewayError {}

impl From<GatewayError> for BillingError {
    fn from(err: GatewayError) -> Self {
        BillingError::upstream(err.to_string(), err.retryable)
    }
}

impl From<GatewayError> for DomainError {
    fn from(err: GatewayError) -> Self {
        DomainError::new(ErrorCode::GatewayError, err.message).with_detail("gateway_code", err.code.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayErrorCode {
    /// Call exceeded the configured timeout.
    Timeout,
    NetworkError,
    AuthenticationError,
    NotFound,

    /// The gateway rejected the request payload.
    InvalidRequest,

    /// Any other non-success answer.
    ProviderError,

    InvalidWebhook,
}

impl GatewayErrorCode {
    /// Timeouts are not retryable: the call may have succeeded upstream.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayErrorCode::NetworkError | GatewayErrorCode::ProviderError)
    }
}

impl std::fmt::Display for GatewayErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GatewayErrorCode::Timeout => "timeout",
            GatewayErrorCode::NetworkError => "network_error",
            GatewayErrorCode::AuthenticationError => "authentication_error",
            GatewayErrorCode::NotFound => "not_found",
            GatewayErrorCode::InvalidRequest => "invalid_request",
            GatewayErrorCode::ProviderError => "provider_error",
            GatewayErrorCode::InvalidWebhook => "invalid_webhook",
        };
        write!(f, "{}", s)
    }
}
