//! Shared harness for the HTTP integration tests.
//!
//! Builds the full router over the in-memory store and the mock gateway, so
//! requests travel the same middleware and handlers as in production.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

use billing_reconciler::adapters::asaas::{MockPaymentGateway, WebhookTokenVerifier, WEBHOOK_TOKEN_HEADER};
use billing_reconciler::adapters::auth::MockSessionValidator;
use billing_reconciler::adapters::http::{app_router, AuthState, BillingAppState, ReferralAppState};
use billing_reconciler::adapters::memory::InMemoryStore;
use billing_reconciler::config::PlansConfig;
use billing_reconciler::domain::billing::Subscription;
use billing_reconciler::domain::foundation::UserId;
use billing_reconciler::domain::referral::Profile;
use billing_reconciler::ports::{ProfileRepository, SubscriptionRepository};

pub const ALICE: &str = "token-alice";
pub const BOB: &str = "token-bob";

pub struct TestApp {
    pub store: InMemoryStore,
    pub gateway: MockPaymentGateway,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(WebhookTokenVerifier::disabled())
    }

    pub fn with_webhook_token(token: &str) -> Self {
        Self::build(WebhookTokenVerifier::new(Some(SecretString::new(token.to_string()))))
    }

    fn build(verifier: WebhookTokenVerifier) -> Self {
        let store = InMemoryStore::new();
        let gateway = MockPaymentGateway::new();
        gateway.set_payment_url("https://sandbox.asaas.test/i/checkout");

        let validator = MockSessionValidator::new()
            .with_test_user(ALICE, "alice")
            .unwrap()
            .with_test_user(BOB, "bob")
            .unwrap();
        let auth: AuthState = Arc::new(validator);

        let billing = BillingAppState {
            profiles: Arc::new(store.clone()),
            subscriptions: Arc::new(store.clone()),
            ledger: Arc::new(store.clone()),
            gateway: Arc::new(gateway.clone()),
            catalog: Arc::new(PlansConfig::default().to_catalog()),
            webhook_verifier: verifier,
        };
        let referral = ReferralAppState {
            profiles: Arc::new(store.clone()),
            ledger: Arc::new(store.clone()),
        };

        Self {
            store,
            gateway,
            router: app_router(billing, referral, auth),
        }
    }

    /// Sends a request and returns the status with the parsed JSON body
    /// (`Value::Null` when the body is empty or not JSON).
    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.dispatch(builder.body(body).unwrap()).await
    }

    /// Posts a raw webhook body, optionally with the gateway token header.
    pub async fn webhook(&self, raw: &str, access_token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/webhooks/gateway")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = access_token {
            builder = builder.header(WEBHOOK_TOKEN_HEADER, token);
        }

        self.dispatch(builder.body(Body::from(raw.to_string())).unwrap()).await
    }

    async fn dispatch(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    /// Starts checkout for `plan` and returns the gateway subscription id
    /// now stored on the user's local row.
    pub async fn checkout(&self, token: &str, plan: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/billing/checkout",
                Some(token),
                Some(serde_json::json!({ "plan": plan, "billingType": "PIX" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "checkout failed: {body}");

        self.subscription_of(user_of(token))
            .await
            .and_then(|s| s.gateway_subscription_id)
            .unwrap()
    }

    pub async fn subscription_of(&self, user: &str) -> Option<Subscription> {
        SubscriptionRepository::find_by_user_id(&self.store, &UserId::new(user).unwrap())
            .await
            .unwrap()
    }

    pub async fn profile_of(&self, user: &str) -> Option<Profile> {
        ProfileRepository::find_by_user_id(&self.store, &UserId::new(user).unwrap())
            .await
            .unwrap()
    }
}

/// User id behind each test token.
pub fn user_of(token: &str) -> &'static str {
    match token {
        ALICE => "alice",
        BOB => "bob",
        other => panic!("unknown test token {other}"),
    }
}

/// Webhook body for a payment event on `subscription`.
pub fn payment_event(event: &str, payment_id: &str, subscription: &str, date: &str) -> String {
    serde_json::json!({
        "event": event,
        "payment": {
            "id": payment_id,
            "subscription": subscription,
            "value": 59.9,
            "paymentDate": date,
            "dateCreated": date,
        }
    })
    .to_string()
}
