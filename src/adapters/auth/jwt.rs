//! Shared-secret JWT session validator.
//!
//! Validates HS256 bearer tokens issued by the hosted auth provider. The
//! token subject becomes the user id; `email` and `name` claims are carried
//! through when present.
//!
//! # Security
//!
//! - Signature, expiry and audience are always checked
//! - Issuer is checked when configured
//! - The signing secret is held as `secrecy::SecretString`

use async_trait::async_trait;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{AuthError, AuthenticatedUser, UserId};
use crate::ports::SessionValidator;

/// Configuration for the JWT validator.
#[derive(Clone)]
pub struct JwtConfig {
    secret: SecretString,
    audience: String,
    issuer: Option<String>,
    leeway_secs: u64,
}

impl JwtConfig {
    pub fn new(secret: SecretString, audience: impl Into<String>) -> Self {
        Self {
            secret,
            audience: audience.into(),
            issuer: None,
            leeway_secs: 30,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Clock skew tolerated on `exp`.
    pub fn with_leeway(mut self, secs: u64) -> Self {
        self.leeway_secs = secs;
        self
    }
}

/// Claims read from the token.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,

    #[serde(default)]
    email: Option<String>,

    #[serde(default)]
    name: Option<String>,
}

/// HS256 implementation of `SessionValidator`.
pub struct JwtSessionValidator {
    config: JwtConfig,
    key: DecodingKey,
    validation: Validation,
}

impl JwtSessionValidator {
    pub fn new(config: JwtConfig) -> Self {
        let key = DecodingKey::from_secret(config.secret.expose_secret().as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&config.audience]);
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        validation.validate_exp = true;
        validation.leeway = config.leeway_secs;
        validation.set_required_spec_claims(&["exp", "sub", "aud"]);

        Self {
            config,
            key,
            validation,
        }
    }
}

#[async_trait]
impl SessionValidator for JwtSessionValidator {
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => {
                tracing::debug!("Token expired");
                AuthError::TokenExpired
            }
            ErrorKind::InvalidAudience => {
                tracing::warn!(expected = %self.config.audience, "Invalid audience in token");
                AuthError::InvalidToken
            }
            ErrorKind::InvalidIssuer => {
                tracing::warn!("Invalid issuer in token");
                AuthError::InvalidToken
            }
            _ => {
                tracing::debug!(error = %e, "Token validation failed");
                AuthError::InvalidToken
            }
        })?;

        let claims = data.claims;
        let user_id = UserId::new(claims.sub).map_err(|_| {
            tracing::warn!("Token with empty subject");
            AuthError::InvalidToken
        })?;

        Ok(AuthenticatedUser::new(user_id, claims.email, claims.name))
    }
}

impl std::fmt::Debug for JwtSessionValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSessionValidator")
            .field("audience", &self.config.audience)
            .field("issuer", &self.config.issuer)
            .finish_non_exhaustive()
    }
}
