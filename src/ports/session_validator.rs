//! Session validation port for bearer tokens.
//!
//! Provider-agnostic. Implementations must check signature, expiry, and
//! (when configured) issuer and audience.

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedUser};

/// Validates access tokens and extracts user identity.
#[async_trait]
pub trait SessionValidator: Send + Sync {
    /// Validate a raw token (without the `Bearer ` prefix).
    ///
    /// * `Err(AuthError::InvalidToken)` - malformed or bad signature
    /// * `Err(AuthError::TokenExpired)` - valid signature but expired
    /// * `Err(AuthError::ServiceUnavailable)` - validator cannot run
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_validator_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn SessionValidator>();
    }
}
