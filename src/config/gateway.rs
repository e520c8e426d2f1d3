//! Payment gateway configuration

use serde::Deserialize;
use std::time::Duration;

use crate::adapters::asaas::DEFAULT_BASE_URL;

use super::error::ValidationError;
use super::server::Environment;

/// Payment gateway (Asaas) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Gateway API key
    pub api_key: String,

    /// API root; point at the sandbox outside production
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Upper bound for every gateway call. Timeouts are not retried.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Shared token expected in the `asaas-access-token` webhook header
    pub webhook_token: Option<String>,
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Configured webhook token, ignoring blank values
    pub fn webhook_token(&self) -> Option<&str> {
        self.webhook_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Validate gateway configuration
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.api_key.trim().is_empty() {
            return Err(ValidationError::MissingRequired("GATEWAY__API_KEY"));
        }
        if !self.base_url.starts_with("https://") && !self.base_url.starts_with("http://") {
            return Err(ValidationError::InvalidGatewayUrl);
        }
        if *environment == Environment::Production && !self.base_url.starts_with("https://") {
            return Err(ValidationError::GatewayUrlMustBeHttps);
        }
        if self.timeout_secs == 0 || self.timeout_secs > 60 {
            return Err(ValidationError::InvalidGatewayTimeout);
        }
        Ok(())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            webhook_token: None,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    10
}
