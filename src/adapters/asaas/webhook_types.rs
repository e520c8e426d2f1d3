//! Asaas wire types.
//!
//! Inbound webhook payloads and the subset of REST response bodies the
//! adapter reads. Unknown fields are ignored.

use serde::{Deserialize, Serialize};

use crate::domain::billing::{GatewayEvent, GatewayEventKind};
use crate::domain::foundation::{Timestamp, ValidationError};

/// Inbound webhook body: `{event, payment: {id, subscription, value, paymentDate|dueDate|dateCreated}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct AsaasWebhookPayload {
    pub event: Option<String>,
    pub payment: Option<AsaasWebhookPayment>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsaasWebhookPayment {
    pub id: Option<String>,
    pub subscription: Option<String>,
    pub value: Option<f64>,
    pub payment_date: Option<String>,
    pub due_date: Option<String>,
    pub date_created: Option<String>,
}

/// Why a well-formed webhook was acknowledged without touching state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoredWebhook {
    UnsupportedEvent(String),
    NoSubscription,
}

/// Outcome of validating a webhook body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedWebhook {
    Event(GatewayEvent),
    Ignored(IgnoredWebhook),
}

impl AsaasWebhookPayload {
    /// Parses a raw body. Anything that is not a JSON object is malformed.
    pub fn from_slice(body: &[u8]) -> Result<Self, ValidationError> {
        serde_json::from_slice(body).map_err(|e| ValidationError::invalid_format("body", e.to_string()))
    }

    /// Validates the payload into a reconciliation event.
    ///
    /// Unknown event names and payments without a subscription are
    /// acknowledged as no-ops. A recognized event with a missing payment id
    /// or an unparseable date is rejected whole.
    pub fn into_event(self) -> Result<ParsedWebhook, ValidationError> {
        let name = self.event.unwrap_or_default();
        let Some(kind) = GatewayEventKind::parse(&name) else {
            return Ok(ParsedWebhook::Ignored(IgnoredWebhook::UnsupportedEvent(name)));
        };

        let Some(payment) = self.payment else {
            return Ok(ParsedWebhook::Ignored(IgnoredWebhook::NoSubscription));
        };
        let subscription = match payment.subscription.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Ok(ParsedWebhook::Ignored(IgnoredWebhook::NoSubscription)),
        };

        let payment_id = payment
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ValidationError::empty_field("payment.id"))?;

        // Settlements are dated by payment, overdue notices by due date. A
        // charge can be generated long before it falls due, so the creation
        // date is only a fallback.
        let candidates = if kind.is_settlement() {
            [
                ("payment.paymentDate", &payment.payment_date),
                ("payment.dateCreated", &payment.date_created),
            ]
        } else {
            [
                ("payment.dueDate", &payment.due_date),
                ("payment.dateCreated", &payment.date_created),
            ]
        };
        let (field, raw) = candidates
            .into_iter()
            .find_map(|(field, value)| value.as_deref().map(|raw| (field, raw)))
            .ok_or_else(|| ValidationError::empty_field(candidates[0].0))?;
        let occurred_at = Timestamp::parse_gateway_date(field, raw)?;

        Ok(ParsedWebhook::Event(GatewayEvent::new(
            kind,
            payment_id,
            subscription,
            occurred_at,
        )))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// REST API bodies
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AsaasCustomerBody<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpf_cnpj: Option<&'a str>,
    pub external_reference: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AsaasCustomerUpdateBody<'a> {
    pub cpf_cnpj: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AsaasSubscriptionBody<'a> {
    pub customer: &'a str,
    pub billing_type: &'a str,
    pub value: f64,
    pub next_due_date: String,
    pub cycle: &'static str,
    pub description: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AsaasCustomer {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsaasSubscription {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub next_due_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsaasPayment {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub invoice_url: Option<String>,
    #[serde(default)]
    pub bank_slip_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AsaasList<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// Asaas error envelope: `{"errors": [{"code": "...", "description": "..."}]}`.
#[derive(Debug, Clone, Deserialize)]
pub struct AsaasErrorBody {
    #[serde(default = "Vec::new")]
    pub errors: Vec<AsaasErrorItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AsaasErrorItem {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl AsaasErrorBody {
    pub fn summary(&self) -> Option<String> {
        let parts: Vec<String> = self
            .errors
            .iter()
            .filter_map(|e| e.description.clone().or_else(|| e.code.clone()))
            .collect();
        (!parts.is_empty()).then(|| parts.join("; "))
    }
}

/// Decimal reais to integer cents.
pub(super) fn to_cents(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

/// Integer cents to decimal reais.
pub(super) fn from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}
