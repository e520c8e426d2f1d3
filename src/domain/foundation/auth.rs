//! Authentication types for the domain layer.
//!
//! Any token issuer can populate these through the `SessionValidator` port;
//! nothing here depends on a specific provider.

use super::UserId;
use thiserror::Error;

/// Authenticated user extracted from a validated bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// The unique user identifier from the auth provider.
    pub id: UserId,

    /// Email address from the token claims, if the issuer includes one.
    pub email: Option<String>,

    /// Display name if available.
    pub display_name: Option<String>,
}

impl AuthenticatedUser {
    pub fn new(id: UserId, email: Option<String>, display_name: Option<String>) -> Self {
        Self {
            id,
            email,
            display_name,
        }
    }

    /// Best-effort name for the gateway customer record.
    ///
    /// Falls back to the email, then to the raw user id.
    pub fn customer_name(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or_else(|| self.id.as_str())
    }
}

/// Authentication errors that can occur during token validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The token is missing, malformed, or has an invalid signature.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// The token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// The authentication service is unavailable (network, config, etc.).
    #[error("Auth service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AuthError {
    /// Creates a service unavailable error with a message.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Returns true if this is a transient error that may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::ServiceUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_id() -> UserId {
        UserId::new("user-123").unwrap()
    }

    #[test]
    fn customer_name_prefers_display_name() {
        let user = AuthenticatedUser::new(
            user_id(),
            Some("ana@example.com".to_string()),
            Some("Ana".to_string()),
        );
        assert_eq!(user.customer_name(), "Ana");
    }

    #[test]
    fn customer_name_falls_back_to_email_then_id() {
        let with_email =
            AuthenticatedUser::new(user_id(), Some("ana@example.com".to_string()), None);
        assert_eq!(with_email.customer_name(), "ana@example.com");

        let bare = AuthenticatedUser::new(user_id(), None, None);
        assert_eq!(bare.customer_name(), "user-123");
    }

    #[test]
    fn auth_error_displays_correctly() {
        assert_eq!(AuthError::InvalidToken.to_string(), "Invalid or expired token");
        assert_eq!(
            AuthError::service_unavailable("Connection refused").to_string(),
            "Auth service unavailable: Connection refused"
        );
    }

    #[test]
    fn only_service_errors_are_transient() {
        assert!(AuthError::service_unavailable("timeout").is_transient());
        assert!(!AuthError::InvalidToken.is_transient());
        assert!(!AuthError::TokenExpired.is_transient());
    }
}
