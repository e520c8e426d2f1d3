//! Asaas payment gateway adapter.
//!
//! Implements `PaymentGateway` against the Asaas v3 REST API and verifies
//! the shared access token Asaas attaches to webhook deliveries.
//!
//! # Security
//!
//! - API key and webhook token held as `secrecy::SecretString`
//! - Webhook token compared in constant time
//!
//! # Configuration
//!
//! ```ignore
//! let config = AsaasConfig::new(api_key).with_base_url("https://sandbox.asaas.com/api");
//! let gateway = AsaasGateway::new(config)?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use subtle::ConstantTimeEq;

use crate::domain::foundation::Timestamp;
use crate::ports::{
    CreateCustomerRequest, CreateSubscriptionRequest, CreatedSubscription, GatewayCustomer,
    GatewayError, GatewayErrorCode, GatewayPayment, GatewaySubscription,
    GatewaySubscriptionStatus, PaymentGateway, PaymentStatus, UpdateCustomerRequest,
};

use super::webhook_types::{
    from_cents, to_cents, AsaasCustomer, AsaasCustomerBody, AsaasCustomerUpdateBody,
    AsaasErrorBody, AsaasList, AsaasPayment, AsaasSubscription, AsaasSubscriptionBody,
};

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://api.asaas.com";

/// Header carrying the API key on outbound calls.
const API_KEY_HEADER: &str = "access_token";

/// Header Asaas sets on webhook deliveries when a token is configured.
pub const WEBHOOK_TOKEN_HEADER: &str = "asaas-access-token";

/// Asaas API configuration.
#[derive(Clone)]
pub struct AsaasConfig {
    api_key: SecretString,
    base_url: String,
    timeout: Duration,
}

impl AsaasConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Set a custom API base URL (sandbox or tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Upper bound for every outbound call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Asaas payment gateway adapter.
pub struct AsaasGateway {
    config: AsaasConfig,
    http_client: reqwest::Client,
}

impl AsaasGateway {
    /// Builds the HTTP client with the configured timeout.
    pub fn new(config: AsaasConfig) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::provider(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, http_client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(API_KEY_HEADER, self.config.api_key.expose_secret())
    }

    /// Sends a request and decodes a JSON body on success.
    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, GatewayError> {
        let response = self.send(operation, request).await?;
        response.json::<T>().await.map_err(|e| {
            tracing::error!(operation, error = %e, "Failed to parse Asaas response");
            GatewayError::provider(format!("Failed to parse Asaas response: {}", e))
        })
    }

    /// Sends a request, mapping transport failures and non-2xx answers.
    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<reqwest::Response, GatewayError> {
        let response = self.authorized(request).send().await.map_err(|e| {
            if e.is_timeout() {
                tracing::error!(operation, timeout_ms = self.config.timeout.as_millis() as u64, "Asaas call timed out");
                GatewayError::timeout(format!("{} timed out", operation))
            } else {
                tracing::error!(operation, error = %e, "Asaas call failed");
                GatewayError::network(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<AsaasErrorBody>(&error_text)
            .ok()
            .and_then(|body| body.summary())
            .unwrap_or(error_text);

        tracing::error!(operation, status = status.as_u16(), error = %detail, "Asaas API error");

        let code = match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayErrorCode::AuthenticationError,
            StatusCode::NOT_FOUND => GatewayErrorCode::NotFound,
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => GatewayErrorCode::InvalidRequest,
            _ => GatewayErrorCode::ProviderError,
        };
        Err(GatewayError::new(code, format!("Asaas API error: {}", detail)))
    }

    /// First open charge of a fresh subscription, for the payment link.
    async fn first_payment_url(&self, subscription_id: &str) -> Result<Option<String>, GatewayError> {
        let url = self.url(&format!("/v3/subscriptions/{}/payments", subscription_id));
        let payments: AsaasList<AsaasPayment> = self
            .send_json("list_subscription_payments", self.http_client.get(&url))
            .await?;

        Ok(payments
            .data
            .into_iter()
            .next()
            .and_then(|p| p.invoice_url.or(p.bank_slip_url)))
    }
}

#[async_trait]
impl PaymentGateway for AsaasGateway {
    async fn create_customer(&self, request: CreateCustomerRequest) -> Result<GatewayCustomer, GatewayError> {
        let body = AsaasCustomerBody {
            name: &request.name,
            email: request.email.as_deref(),
            cpf_cnpj: request.tax_id.as_deref(),
            external_reference: request.user_id.as_str(),
        };

        let customer: AsaasCustomer = self
            .send_json("create_customer", self.http_client.post(self.url("/v3/customers")).json(&body))
            .await?;

        tracing::info!(user_id = %request.user_id, customer_id = %customer.id, "Asaas customer created");
        Ok(GatewayCustomer { id: customer.id })
    }

    async fn update_customer(
        &self,
        customer_id: &str,
        request: UpdateCustomerRequest,
    ) -> Result<(), GatewayError> {
        let body = AsaasCustomerUpdateBody { cpf_cnpj: &request.tax_id };
        let url = self.url(&format!("/v3/customers/{}", customer_id));
        self.send("update_customer", self.http_client.put(&url).json(&body)).await?;
        Ok(())
    }

    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<CreatedSubscription, GatewayError> {
        let body = AsaasSubscriptionBody {
            customer: &request.customer_id,
            billing_type: &request.billing_type,
            value: from_cents(request.value_cents),
            next_due_date: request.next_due_date.date_string(),
            cycle: "MONTHLY",
            description: &request.description,
        };

        let created: AsaasSubscription = self
            .send_json(
                "create_subscription",
                self.http_client.post(self.url("/v3/subscriptions")).json(&body),
            )
            .await?;

        // The subscription exists at this point; a missing link is not fatal.
        let payment_url = match self.first_payment_url(&created.id).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(subscription_id = %created.id, error = %e, "Could not fetch first payment link");
                None
            }
        };

        tracing::info!(
            subscription_id = %created.id,
            plan = request.plan.as_str(),
            value_cents = request.value_cents,
            "Asaas subscription created"
        );

        Ok(CreatedSubscription {
            id: created.id,
            payment_url,
        })
    }

    async fn get_subscription(&self, subscription_id: &str) -> Result<GatewaySubscription, GatewayError> {
        let url = self.url(&format!("/v3/subscriptions/{}", subscription_id));
        let sub: AsaasSubscription = self.send_json("get_subscription", self.http_client.get(&url)).await?;

        let next_due_date = match sub.next_due_date.as_deref() {
            Some(raw) => Some(
                Timestamp::parse_gateway_date("nextDueDate", raw)
                    .map_err(|e| GatewayError::provider(e.to_string()))?,
            ),
            None => None,
        };

        Ok(GatewaySubscription {
            id: sub.id,
            status: GatewaySubscriptionStatus::parse(sub.status.as_deref().unwrap_or_default()),
            next_due_date,
        })
    }

    async fn list_payments(
        &self,
        customer_id: &str,
        statuses: &[PaymentStatus],
    ) -> Result<Vec<GatewayPayment>, GatewayError> {
        let url = self.url("/v3/payments");
        let mut payments = Vec::new();

        // The API filters by a single status per call.
        for status in statuses {
            let page: AsaasList<AsaasPayment> = self
                .send_json(
                    "list_payments",
                    self.http_client
                        .get(&url)
                        .query(&[("customer", customer_id), ("status", status.as_str())]),
                )
                .await?;

            payments.extend(page.data.into_iter().map(|p| GatewayPayment {
                id: p.id,
                status: p.status.unwrap_or_else(|| status.as_str().to_string()),
                value_cents: p.value.map(to_cents).unwrap_or(0),
                due_date: p.due_date,
                invoice_url: p.invoice_url.or(p.bank_slip_url),
            }));
        }

        Ok(payments)
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), GatewayError> {
        let url = self.url(&format!("/v3/subscriptions/{}", subscription_id));
        self.send("cancel_subscription", self.http_client.delete(&url)).await?;
        tracing::info!(subscription_id, "Asaas subscription canceled");
        Ok(())
    }
}

/// Checks the shared token on inbound webhook deliveries.
///
/// With no token configured every delivery is accepted.
#[derive(Clone, Default)]
pub struct WebhookTokenVerifier {
    expected: Option<SecretString>,
}

impl WebhookTokenVerifier {
    pub fn new(expected: Option<SecretString>) -> Self {
        Self { expected }
    }

    pub fn disabled() -> Self {
        Self { expected: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.expected.is_some()
    }

    pub fn verify(&self, provided: Option<&str>) -> Result<(), GatewayError> {
        let Some(expected) = &self.expected else {
            return Ok(());
        };

        let Some(provided) = provided else {
            tracing::warn!("Webhook delivery without access token");
            return Err(GatewayError::new(GatewayErrorCode::InvalidWebhook, "Missing webhook token"));
        };

        let expected_bytes = expected.expose_secret().as_bytes();
        if expected_bytes.ct_eq(provided.as_bytes()).unwrap_u8() != 1 {
            tracing::warn!("Webhook delivery with invalid access token");
            return Err(GatewayError::new(GatewayErrorCode::InvalidWebhook, "Invalid webhook token"));
        }

        Ok(())
    }
}
