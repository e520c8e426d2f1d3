//! Mock payment gateway for testing.
//!
//! Configurable in-process `PaymentGateway` for unit and integration tests.
//! Supports:
//! - Seeded subscriptions and payments
//! - Error injection, per method or one-shot
//! - Call tracking

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::foundation::Timestamp;
use crate::ports::{
    CreateCustomerRequest, CreateSubscriptionRequest, CreatedSubscription, GatewayCustomer,
    GatewayError, GatewayPayment, GatewaySubscription, GatewaySubscriptionStatus, PaymentGateway,
    PaymentStatus, UpdateCustomerRequest,
};

/// Mock payment gateway.
///
/// ```ignore
/// let gateway = MockPaymentGateway::new();
/// gateway.set_method_error("cancel_subscription", GatewayError::timeout("slow"));
/// ```
#[derive(Default, Clone)]
pub struct MockPaymentGateway {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    customers: HashMap<String, CreateCustomerRequest>,
    subscriptions: HashMap<String, GatewaySubscription>,

    /// Payments by customer id.
    payments: HashMap<String, Vec<GatewayPayment>>,

    /// Payment link returned by the next `create_subscription`.
    payment_url: Option<String>,

    sequence: u32,

    /// Error to return on next call (consumed).
    next_error: Option<GatewayError>,

    /// Sticky errors by method name.
    method_errors: HashMap<String, GatewayError>,

    call_log: Vec<MethodCall>,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Seeds (or replaces) the gateway view of a subscription.
    pub fn set_subscription(
        &self,
        id: impl Into<String>,
        status: GatewaySubscriptionStatus,
        next_due_date: Option<Timestamp>,
    ) {
        let id = id.into();
        self.state().subscriptions.insert(
            id.clone(),
            GatewaySubscription {
                id,
                status,
                next_due_date,
            },
        );
    }

    /// Adds a payment for a customer.
    pub fn add_payment(&self, customer_id: impl Into<String>, payment: GatewayPayment) {
        self.state()
            .payments
            .entry(customer_id.into())
            .or_default()
            .push(payment);
    }

    pub fn set_payment_url(&self, url: impl Into<String>) {
        self.state().payment_url = Some(url.into());
    }

    /// Set an error to return on the next call to any method.
    pub fn set_error(&self, error: GatewayError) {
        self.state().next_error = Some(error);
    }

    /// Set an error for a specific method until cleared.
    pub fn set_method_error(&self, method: &str, error: GatewayError) {
        self.state().method_errors.insert(method.to_string(), error);
    }

    pub fn clear_errors(&self) {
        let mut state = self.state();
        state.next_error = None;
        state.method_errors.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Inspection
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.state().call_log.iter().any(|c| c.method == method)
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    pub fn subscription(&self, id: &str) -> Option<GatewaySubscription> {
        self.state().subscriptions.get(id).cloned()
    }

    pub fn customer_count(&self) -> usize {
        self.state().customers.len()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    /// Records the call, then fails if an error is armed for it.
    fn enter(&self, method: &str, args: Vec<String>) -> Result<(), GatewayError> {
        let mut state = self.state();
        state.call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });

        if let Some(error) = state.method_errors.get(method) {
            return Err(error.clone());
        }
        if let Some(error) = state.next_error.take() {
            return Err(error);
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_customer(&self, request: CreateCustomerRequest) -> Result<GatewayCustomer, GatewayError> {
        self.enter("create_customer", vec![request.user_id.to_string()])?;

        let mut state = self.state();
        state.sequence += 1;
        let id = format!("cus_mock_{}", state.sequence);
        state.customers.insert(id.clone(), request);
        Ok(GatewayCustomer { id })
    }

    async fn update_customer(
        &self,
        customer_id: &str,
        request: UpdateCustomerRequest,
    ) -> Result<(), GatewayError> {
        self.enter("update_customer", vec![customer_id.to_string(), request.tax_id.clone()])?;

        let mut state = self.state();
        let customer = state
            .customers
            .get_mut(customer_id)
            .ok_or_else(|| GatewayError::not_found("customer"))?;
        customer.tax_id = Some(request.tax_id);
        Ok(())
    }

    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<CreatedSubscription, GatewayError> {
        self.enter(
            "create_subscription",
            vec![
                request.customer_id.clone(),
                request.plan.as_str().to_string(),
                request.value_cents.to_string(),
                request.billing_type.clone(),
            ],
        )?;

        let mut state = self.state();
        state.sequence += 1;
        let id = format!("sub_mock_{}", state.sequence);
        state.subscriptions.insert(
            id.clone(),
            GatewaySubscription {
                id: id.clone(),
                status: GatewaySubscriptionStatus::Active,
                next_due_date: Some(request.next_due_date),
            },
        );

        Ok(CreatedSubscription {
            id,
            payment_url: state.payment_url.clone(),
        })
    }

    async fn get_subscription(&self, subscription_id: &str) -> Result<GatewaySubscription, GatewayError> {
        self.enter("get_subscription", vec![subscription_id.to_string()])?;

        self.state()
            .subscriptions
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| GatewayError::not_found("subscription"))
    }

    async fn list_payments(
        &self,
        customer_id: &str,
        statuses: &[PaymentStatus],
    ) -> Result<Vec<GatewayPayment>, GatewayError> {
        self.enter("list_payments", vec![customer_id.to_string()])?;

        let state = self.state();
        let payments = state
            .payments
            .get(customer_id)
            .map(|all| {
                all.iter()
                    .filter(|p| statuses.iter().any(|s| s.as_str() == p.status))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(payments)
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), GatewayError> {
        self.enter("cancel_subscription", vec![subscription_id.to_string()])?;

        let mut state = self.state();
        let sub = state
            .subscriptions
            .get_mut(subscription_id)
            .ok_or_else(|| GatewayError::not_found("subscription"))?;
        sub.status = GatewaySubscriptionStatus::Inactive;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::Plan;
    use crate::domain::foundation::UserId;

    fn customer_request() -> CreateCustomerRequest {
        CreateCustomerRequest {
            user_id: UserId::new("user-1").unwrap(),
            name: "Ana".to_string(),
            email: Some("ana@example.com".to_string()),
            tax_id: None,
        }
    }

    #[tokio::test]
    async fn creates_customer_and_subscription() {
        let gateway = MockPaymentGateway::new();
        gateway.set_payment_url("https://pay.example/1");

        let customer = gateway.create_customer(customer_request()).await.unwrap();
        let created = gateway
            .create_subscription(CreateSubscriptionRequest {
                customer_id: customer.id.clone(),
                plan: Plan::Pro,
                value_cents: 5990,
                description: "Pro".to_string(),
                billing_type: "PIX".to_string(),
                next_due_date: Timestamp::now(),
            })
            .await
            .unwrap();

        assert_eq!(created.payment_url.as_deref(), Some("https://pay.example/1"));
        assert_eq!(
            gateway.subscription(&created.id).unwrap().status,
            GatewaySubscriptionStatus::Active
        );
        assert_eq!(gateway.call_count("create_customer"), 1);
    }

    #[tokio::test]
    async fn one_shot_error_is_consumed() {
        let gateway = MockPaymentGateway::new();
        gateway.set_error(GatewayError::network("reset"));

        assert!(gateway.create_customer(customer_request()).await.is_err());
        assert!(gateway.create_customer(customer_request()).await.is_ok());
    }

    #[tokio::test]
    async fn method_error_is_sticky_and_recorded() {
        let gateway = MockPaymentGateway::new();
        gateway.set_method_error("cancel_subscription", GatewayError::timeout("slow"));

        assert!(gateway.cancel_subscription("sub_1").await.is_err());
        assert!(gateway.cancel_subscription("sub_1").await.is_err());
        assert_eq!(gateway.call_count("cancel_subscription"), 2);

        gateway.clear_errors();
        assert!(gateway.cancel_subscription("sub_1").await.is_err()); // unknown id
    }

    #[tokio::test]
    async fn list_payments_filters_by_status() {
        let gateway = MockPaymentGateway::new();
        for (id, status) in [("pay_1", "PENDING"), ("pay_2", "REFUNDED"), ("pay_3", "RECEIVED")] {
            gateway.add_payment(
                "cus_1",
                GatewayPayment {
                    id: id.to_string(),
                    status: status.to_string(),
                    value_cents: 5990,
                    due_date: None,
                    invoice_url: None,
                },
            );
        }

        let payments = gateway
            .list_payments("cus_1", &[PaymentStatus::Pending, PaymentStatus::Received])
            .await
            .unwrap();
        let ids: Vec<_> = payments.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["pay_1", "pay_3"]);
    }
}
