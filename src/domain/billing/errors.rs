//! Billing-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | SubscriptionNotFound | 404 |
//! | InvalidPlan | 400 |
//! | ValidationFailed | 400 |
//! | InvalidState | 409 |
//! | Upstream | 502 |
//! | Infrastructure | 500 |

use crate::domain::foundation::{DomainError, ErrorCode, UserId, ValidationError};

/// Billing errors surfaced by the application handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingError {
    /// No subscription exists for this user.
    SubscriptionNotFound(UserId),

    /// Unknown or non-purchasable plan key.
    InvalidPlan(String),

    /// Malformed request or event.
    ValidationFailed { field: String, message: String },

    /// Transition not allowed from the current status.
    InvalidState { current: String, attempted: String },

    /// Gateway unreachable, timed out, or answered with a failure.
    Upstream { message: String, retryable: bool },

    /// Store failure.
    Infrastructure(String),
}

impl BillingError {
    pub fn not_found(user_id: UserId) -> Self {
        BillingError::SubscriptionNotFound(user_id)
    }

    pub fn invalid_plan(plan: impl Into<String>) -> Self {
        BillingError::InvalidPlan(plan.into())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        BillingError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn upstream(message: impl Into<String>, retryable: bool) -> Self {
        BillingError::Upstream {
            message: message.into(),
            retryable,
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        BillingError::Infrastructure(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            BillingError::SubscriptionNotFound(_) => ErrorCode::SubscriptionNotFound,
            BillingError::InvalidPlan(_) => ErrorCode::InvalidPlan,
            BillingError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            BillingError::InvalidState { .. } => ErrorCode::InvalidStateTransition,
            BillingError::Upstream { .. } => ErrorCode::GatewayError,
            BillingError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    /// Internal description, for logs only.
    pub fn message(&self) -> String {
        match self {
            BillingError::SubscriptionNotFound(user_id) => {
                format!("No subscription found for user: {}", user_id)
            }
            BillingError::InvalidPlan(plan) => format!("Invalid plan: {}", plan),
            BillingError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            BillingError::InvalidState { current, attempted } => {
                format!("Cannot move subscription from {} to {}", current, attempted)
            }
            BillingError::Upstream { message, .. } => format!("Payment gateway error: {}", message),
            BillingError::Infrastructure(msg) => format!("Storage error: {}", msg),
        }
    }

    /// Returns true if the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        match self {
            BillingError::Infrastructure(_) => true,
            BillingError::Upstream { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

impl std::fmt::Display for BillingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for BillingError {}

impl From<DomainError> for BillingError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed | ErrorCode::MalformedEvent => BillingError::ValidationFailed {
                field: err.details.get("field").cloned().unwrap_or_default(),
                message: err.message,
            },
            ErrorCode::InvalidPlan => BillingError::InvalidPlan(err.message),
            ErrorCode::InvalidStateTransition => BillingError::InvalidState {
                current: err.details.get("current").cloned().unwrap_or_default(),
                attempted: err.details.get("attempted").cloned().unwrap_or_default(),
            },
            ErrorCode::GatewayError => BillingError::upstream(err.message, false),
            _ => BillingError::Infrastructure(err.to_string()),
        }
    }
}

impl From<ValidationError> for BillingError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::UnknownValue { ref field, ref value } if field == "plan" => {
                BillingError::InvalidPlan(value.clone())
            }
            other => BillingError::validation(other.field().to_string(), other.to_string()),
        }
    }
}

impl From<BillingError> for DomainError {
    fn from(err: BillingError) -> Self {
        DomainError::new(err.code(), err.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_has_code() {
        let err = BillingError::not_found(UserId::new("u1").unwrap());
        assert_eq!(err.code(), ErrorCode::SubscriptionNotFound);
        assert!(!err.is_retryable());
    }

    #[test]
    fn upstream_retryability_follows_flag() {
        assert!(BillingError::upstream("503", true).is_retryable());
        assert!(!BillingError::upstream("timeout", false).is_retryable());
    }

    #[test]
    fn infrastructure_is_retryable() {
        assert!(BillingError::infrastructure("pool closed").is_retryable());
    }

    #[test]
    fn unknown_plan_validation_maps_to_invalid_plan() {
        let err: BillingError = ValidationError::unknown_value("plan", "gold").into();
        assert_eq!(err, BillingError::InvalidPlan("gold".to_string()));
    }

    #[test]
    fn other_validation_keeps_field() {
        let err: BillingError = ValidationError::empty_field("billing_type").into();
        assert!(matches!(
            err,
            BillingError::ValidationFailed { ref field, .. } if field == "billing_type"
        ));
    }

    #[test]
    fn invalid_transition_domain_error_maps_to_invalid_state() {
        let domain = DomainError::new(ErrorCode::InvalidStateTransition, "nope")
            .with_detail("current", "canceled")
            .with_detail("attempted", "canceled");
        let err: BillingError = domain.into();
        assert_eq!(
            err,
            BillingError::InvalidState {
                current: "canceled".to_string(),
                attempted: "canceled".to_string()
            }
        );
    }

    #[test]
    fn database_domain_error_maps_to_infrastructure() {
        let err: BillingError = DomainError::database("boom").into();
        assert_eq!(err.code(), ErrorCode::DatabaseError);
    }

    #[test]
    fn converts_back_to_domain_error() {
        let domain: DomainError = BillingError::invalid_plan("gold").into();
        assert_eq!(domain.code, ErrorCode::InvalidPlan);
    }
}
