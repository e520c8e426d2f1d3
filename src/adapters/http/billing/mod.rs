//! Billing HTTP adapter: checkout, invoices, cancellation, tax id and the
//! gateway webhook.

mod dto;
mod handlers;
mod routes;

pub use dto::{
    CancelResponse, CheckoutRequest, CheckoutResponse, InvoiceView, InvoicesResponse,
    SubscriptionView, UpdateTaxIdRequest, UpdateTaxIdResponse, WebhookAck,
};
pub use handlers::{BillingApiError, BillingAppState, WebhookRejection};
pub use routes::{billing_routes, webhook_routes};
