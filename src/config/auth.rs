//! Authentication configuration

use serde::Deserialize;

use super::error::ValidationError;

const MIN_SECRET_LEN: usize = 32;

/// Bearer token validation settings (HS256 JWT).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Shared HMAC secret used by the token issuer
    pub jwt_secret: String,

    /// Expected `aud` claim
    pub jwt_audience: String,

    /// Expected `iss` claim, checked only when set
    pub jwt_issuer: Option<String>,
}

impl AuthConfig {
    /// Validate authentication configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.jwt_secret.is_empty() {
            return Err(ValidationError::MissingRequired("AUTH__JWT_SECRET"));
        }
        if self.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ValidationError::JwtSecretTooShort);
        }
        if self.jwt_audience.trim().is_empty() {
            return Err(ValidationError::MissingRequired("AUTH__JWT_AUDIENCE"));
        }
        Ok(())
    }
}
