//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables with the
//! `config` and `dotenvy` crates. Variables use the `BILLING_RECONCILER`
//! prefix and `__` between nested keys.
//!
//! # Example
//!
//! ```no_run
//! use billing_reconciler::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod auth;
mod database;
mod error;
mod gateway;
mod plans;
mod server;

pub use auth::AuthConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use gateway::GatewayConfig;
pub use plans::{PlanPriceConfig, PlansConfig};
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

const ENV_PREFIX: &str = "BILLING_RECONCILER";

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Listener, environment, and HTTP middleware settings
    #[serde(default)]
    pub server: ServerConfig,

    /// PostgreSQL connection pool
    pub database: DatabaseConfig,

    /// Bearer token validation
    pub auth: AuthConfig,

    /// Payment gateway client and webhook token
    pub gateway: GatewayConfig,

    /// Plan price table
    #[serde(default)]
    pub plans: PlansConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` if present (development)
    /// 2. Reads variables with the `BILLING_RECONCILER` prefix
    /// 3. Splits nested keys on `__`
    ///
    /// - `BILLING_RECONCILER__SERVER__LISTEN=0.0.0.0:8080` -> `server.listen`
    /// - `BILLING_RECONCILER__PLANS__PRO__VALUE_CENTS=5990` -> `plans.pro.value_cents = 5990`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or cannot be
    /// parsed into the expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix(ENV_PREFIX)
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found, section by section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.auth.validate()?;
        self.gateway.validate(&self.server.environment)?;
        self.plans.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::Plan;
    use std::env;
    use std::sync::Mutex;

    // env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const MINIMAL_ENV: [(&str, &str); 4] = [
        ("BILLING_RECONCILER__DATABASE__URL", "postgresql://test@localhost/billing"),
        ("BILLING_RECONCILER__AUTH__JWT_SECRET", "0123456789abcdef0123456789abcdef"),
        ("BILLING_RECONCILER__AUTH__JWT_AUDIENCE", "authenticated"),
        ("BILLING_RECONCILER__GATEWAY__API_KEY", "$aact_test_key"),
    ];

    const OPTIONAL_ENV: [&str; 5] = [
        "BILLING_RECONCILER__SERVER__LISTEN",
        "BILLING_RECONCILER__SERVER__ENVIRONMENT",
        "BILLING_RECONCILER__GATEWAY__WEBHOOK_TOKEN",
        "BILLING_RECONCILER__PLANS__PRO__VALUE_CENTS",
        "BILLING_RECONCILER__PLANS__PRO__DESCRIPTION",
    ];

    fn set_minimal_env() {
        for (key, value) in MINIMAL_ENV {
            env::set_var(key, value);
        }
    }

    fn clear_env() {
        for (key, _) in MINIMAL_ENV {
            env::remove_var(key);
        }
        for key in OPTIONAL_ENV {
            env::remove_var(key);
        }
    }

    fn load_with(extra: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        set_minimal_env();
        for (key, value) in extra {
            env::set_var(key, value);
        }
        let result = AppConfig::load();
        clear_env();
        result
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[]).unwrap();

        assert_eq!(config.database.url, "postgresql://test@localhost/billing");
        assert_eq!(config.auth.jwt_audience, "authenticated");
        assert_eq!(config.server.listen.port(), 8080);
        assert_eq!(config.server.environment, Environment::Development);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_nested_values() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[
            ("BILLING_RECONCILER__SERVER__LISTEN", "127.0.0.1:3000"),
            ("BILLING_RECONCILER__SERVER__ENVIRONMENT", "production"),
            ("BILLING_RECONCILER__GATEWAY__WEBHOOK_TOKEN", "whk-123"),
        ])
        .unwrap();

        assert_eq!(config.server.listen.to_string(), "127.0.0.1:3000");
        assert!(config.is_production());
        assert_eq!(config.gateway.webhook_token(), Some("whk-123"));
    }

    #[test]
    fn test_plan_price_override_reaches_catalog() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[
            ("BILLING_RECONCILER__PLANS__PRO__VALUE_CENTS", "7990"),
            ("BILLING_RECONCILER__PLANS__PRO__DESCRIPTION", "Pro"),
        ])
        .unwrap();

        let catalog = config.plans.to_catalog();
        assert_eq!(catalog.price_for(Plan::Pro).unwrap().value_cents, 7990);
        assert_eq!(catalog.price_for(Plan::Light).unwrap().value_cents, 2990);
    }

    #[test]
    fn test_missing_required_section_fails_to_load() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        assert!(AppConfig::load().is_err());
    }
}
