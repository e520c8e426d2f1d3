//! Billing Reconciler server
//!
//! ## Endpoints
//!
//! - `POST /api/webhooks/gateway` - Gateway payment events
//! - `POST /api/billing/checkout` - Start checkout
//! - `GET /api/billing/invoices` - Open invoices and subscription status
//! - `POST /api/billing/cancel` - Cancel auto-renewal
//! - `PUT /api/billing/tax-id` - Set CPF/CNPJ
//! - `GET /api/referral` - Referral code and payouts
//! - `POST /api/referral/apply` - Apply a referral code
//! - `GET /health` - Liveness check

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use secrecy::SecretString;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use billing_reconciler::adapters::asaas::{AsaasConfig, AsaasGateway, WebhookTokenVerifier};
use billing_reconciler::adapters::auth::{JwtConfig, JwtSessionValidator};
use billing_reconciler::adapters::http::{app_router, AuthState, BillingAppState, ReferralAppState};
use billing_reconciler::adapters::postgres::{
    PostgresProfileRepository, PostgresRewardLedger, PostgresSubscriptionRepository,
};
use billing_reconciler::config::{AppConfig, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);

    config.validate()?;
    tracing::info!(
        environment = ?config.server.environment,
        gateway = %config.gateway.base_url,
        webhook_token = config.gateway.webhook_token().is_some(),
        "configuration loaded"
    );

    let pool = config
        .database
        .pool_options()
        .connect(&config.database.url)
        .await?;
    tracing::info!("database pool created");

    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("database migrations applied");
    }

    let gateway = AsaasGateway::new(
        AsaasConfig::new(config.gateway.api_key.clone())
            .with_base_url(config.gateway.base_url.clone())
            .with_timeout(config.gateway.timeout()),
    )?;

    let mut jwt = JwtConfig::new(
        SecretString::new(config.auth.jwt_secret.clone()),
        config.auth.jwt_audience.clone(),
    );
    if let Some(issuer) = &config.auth.jwt_issuer {
        jwt = jwt.with_issuer(issuer.clone());
    }
    let auth: AuthState = Arc::new(JwtSessionValidator::new(jwt));

    let profiles = Arc::new(PostgresProfileRepository::new(pool.clone()));
    let ledger = Arc::new(PostgresRewardLedger::new(pool.clone()));

    let billing = BillingAppState {
        profiles: profiles.clone(),
        subscriptions: Arc::new(PostgresSubscriptionRepository::new(pool.clone())),
        ledger: ledger.clone(),
        gateway: Arc::new(gateway),
        catalog: Arc::new(config.plans.to_catalog()),
        webhook_verifier: WebhookTokenVerifier::new(
            config
                .gateway
                .webhook_token()
                .map(|token| SecretString::new(token.to_string())),
        ),
    };
    let referral = ReferralAppState { profiles, ledger };

    let app = with_middleware(app_router(billing, referral, auth), &config.server);

    let addr = config.server.listen;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutdown complete");
    Ok(())
}

/// JSON lines in production, human-readable output elsewhere.
/// `RUST_LOG` wins over the configured filter.
fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&server.log_filter));

    if server.is_production() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .compact()
            .with_env_filter(filter)
            .init();
    }
}

fn with_middleware(router: Router, server: &ServerConfig) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(server))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(server.request_timeout()));

    router.layer(middleware)
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .allowed_origins()
        .into_iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() && !server.is_production() {
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
