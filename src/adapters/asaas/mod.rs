//! Asaas payment gateway adapter.
//!
//! Implements the `PaymentGateway` port for Asaas, including:
//! - Customer management
//! - Monthly subscriptions and their payments
//! - Webhook payload parsing and token verification
//!
//! # Configuration
//!
//! Read from the `gateway` config section:
//! - `api_key`: Asaas API key
//! - `base_url`: API root (production or sandbox)
//! - `webhook_token`: optional shared token expected on webhook deliveries

mod asaas_adapter;
mod mock_payment_gateway;
mod webhook_types;

pub use asaas_adapter::{AsaasConfig, AsaasGateway, WebhookTokenVerifier, DEFAULT_BASE_URL, WEBHOOK_TOKEN_HEADER};
pub use mock_payment_gateway::{MethodCall, MockPaymentGateway};
pub use webhook_types::{
    AsaasCustomer, AsaasErrorBody, AsaasPayment, AsaasSubscription, AsaasWebhookPayload,
    AsaasWebhookPayment, IgnoredWebhook, ParsedWebhook,
};
