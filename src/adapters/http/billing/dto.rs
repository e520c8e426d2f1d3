//! HTTP DTOs for billing endpoints.
//!
//! Wire format is camelCase, matching what the web client already sends.

use serde::{Deserialize, Serialize};

use crate::application::handlers::billing::{
    CancelSubscriptionResult, StartCheckoutResult, SubscriptionSnapshot, UpdateTaxIdResult,
};
use crate::domain::foundation::Timestamp;
use crate::ports::GatewayPayment;

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to start checkout for a plan.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    /// Plan key: light, pro or vip.
    pub plan: String,
    /// Gateway billing method, passed through (e.g. PIX, BOLETO, CREDIT_CARD).
    pub billing_type: String,
}

/// Request to set the user's CPF/CNPJ.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaxIdRequest {
    pub tax_id: String,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Acknowledgement returned to the gateway for every accepted delivery.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

impl WebhookAck {
    pub fn received() -> Self {
        Self { received: true }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub success: bool,
    pub plan: String,
    pub payment_url: Option<String>,
}

impl From<StartCheckoutResult> for CheckoutResponse {
    fn from(result: StartCheckoutResult) -> Self {
        Self {
            success: true,
            plan: result.plan.as_str().to_string(),
            payment_url: result.payment_url,
        }
    }
}

/// Local subscription as shown to the user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    pub plan: String,
    pub status: String,
    pub current_period_end: Option<Timestamp>,
    pub has_access: bool,
}

impl From<SubscriptionSnapshot> for SubscriptionView {
    fn from(snapshot: SubscriptionSnapshot) -> Self {
        let subscription = snapshot.subscription;
        Self {
            plan: subscription.plan.as_str().to_string(),
            status: subscription.status.as_str().to_string(),
            current_period_end: subscription.current_period_end,
            has_access: snapshot.has_access,
        }
    }
}

/// Open gateway charge.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceView {
    pub id: String,
    pub status: String,
    /// Amount in currency units (reais), as the gateway reports it.
    pub value: f64,
    pub due_date: Option<String>,
    pub invoice_url: Option<String>,
}

impl From<GatewayPayment> for InvoiceView {
    fn from(payment: GatewayPayment) -> Self {
        Self {
            id: payment.id,
            status: payment.status,
            value: payment.value_cents as f64 / 100.0,
            due_date: payment.due_date,
            invoice_url: payment.invoice_url,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoicesResponse {
    pub subscription: Option<SubscriptionView>,
    pub invoices: Vec<InvoiceView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub success: bool,
    pub status: String,
    /// Access continues until this date.
    pub access_until: Option<Timestamp>,
}

impl From<CancelSubscriptionResult> for CancelResponse {
    fn from(result: CancelSubscriptionResult) -> Self {
        Self {
            success: true,
            status: result.subscription.status.as_str().to_string(),
            access_until: result.access_until,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaxIdResponse {
    pub success: bool,
    pub tax_id: String,
    /// False when the gateway customer could not be updated. The local
    /// value is saved either way.
    pub gateway_synced: bool,
}

impl From<UpdateTaxIdResult> for UpdateTaxIdResponse {
    fn from(result: UpdateTaxIdResult) -> Self {
        Self {
            success: true,
            tax_id: result.tax_id.as_str().to_string(),
            gateway_synced: result.gateway_synced,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{Plan, Subscription};
    use crate::domain::foundation::UserId;

    #[test]
    fn checkout_request_reads_camel_case() {
        let req: CheckoutRequest =
            serde_json::from_str(r#"{"plan":"pro","billingType":"PIX"}"#).unwrap();
        assert_eq!(req.plan, "pro");
        assert_eq!(req.billing_type, "PIX");
    }

    #[test]
    fn tax_id_request_reads_camel_case() {
        let req: UpdateTaxIdRequest = serde_json::from_str(r#"{"taxId":"123.456.789-09"}"#).unwrap();
        assert_eq!(req.tax_id, "123.456.789-09");
    }

    #[test]
    fn webhook_ack_serializes_received_true() {
        let json = serde_json::to_value(WebhookAck::received()).unwrap();
        assert_eq!(json, serde_json::json!({"received": true}));
    }

    #[test]
    fn subscription_view_uses_camel_case_fields() {
        let sub = Subscription::pending(UserId::new("u1").unwrap(), "sub_1", Plan::Pro);
        let view = SubscriptionView::from(SubscriptionSnapshot {
            subscription: sub,
            has_access: false,
        });

        let json = serde_json::to_value(view).unwrap();
        assert_eq!(json["plan"], "pro");
        assert_eq!(json["status"], "pending");
        assert!(json["currentPeriodEnd"].is_null());
        assert_eq!(json["hasAccess"], false);
    }

    #[test]
    fn invoice_view_converts_cents_to_reais() {
        let view = InvoiceView::from(GatewayPayment {
            id: "pay_1".to_string(),
            status: "PENDING".to_string(),
            value_cents: 5990,
            due_date: Some("2024-05-10".to_string()),
            invoice_url: Some("https://pay.example/i/1".to_string()),
        });

        let json = serde_json::to_value(view).unwrap();
        assert_eq!(json["value"], 59.9);
        assert_eq!(json["dueDate"], "2024-05-10");
        assert_eq!(json["invoiceUrl"], "https://pay.example/i/1");
    }
}
