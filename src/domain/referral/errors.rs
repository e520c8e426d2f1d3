//! Referral-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | ProfileNotFound | 404 |
//! | CodeNotFound | 404 |
//! | AlreadyReferred | 409 |
//! | SelfReferral | 400 |
//! | ValidationFailed | 400 |
//! | Infrastructure | 500 |

use crate::domain::foundation::{DomainError, ErrorCode, UserId, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferralError {
    ProfileNotFound(UserId),

    /// No profile owns this referral code.
    CodeNotFound(String),

    /// The user already has a referrer recorded.
    AlreadyReferred(UserId),

    SelfReferral,

    ValidationFailed { field: String, message: String },

    Infrastructure(String),
}

impl ReferralError {
    pub fn code_not_found(code: impl Into<String>) -> Self {
        ReferralError::CodeNotFound(code.into())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ReferralError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        ReferralError::Infrastructure(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ReferralError::ProfileNotFound(_) => ErrorCode::ProfileNotFound,
            ReferralError::CodeNotFound(_) => ErrorCode::ReferralCodeNotFound,
            ReferralError::AlreadyReferred(_) => ErrorCode::ReferralAlreadySet,
            ReferralError::SelfReferral => ErrorCode::SelfReferral,
            ReferralError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            ReferralError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ReferralError::ProfileNotFound(user_id) => format!("No profile for user: {}", user_id),
            ReferralError::CodeNotFound(code) => format!("Referral code not found: {}", code),
            ReferralError::AlreadyReferred(user_id) => {
                format!("User {} already has a referrer", user_id)
            }
            ReferralError::SelfReferral => "A user cannot refer themselves".to_string(),
            ReferralError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            ReferralError::Infrastructure(msg) => format!("Storage error: {}", msg),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ReferralError::Infrastructure(_))
    }
}

impl std::fmt::Display for ReferralError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ReferralError {}

impl From<DomainError> for ReferralError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => ReferralError::ValidationFailed {
                field: err.details.get("field").cloned().unwrap_or_default(),
                message: err.message,
            },
            ErrorCode::SelfReferral => ReferralError::SelfReferral,
            ErrorCode::ReferralCodeNotFound => ReferralError::CodeNotFound(
                err.details.get("code").cloned().unwrap_or_default(),
            ),
            _ => ReferralError::Infrastructure(err.to_string()),
        }
    }
}

impl From<ValidationError> for ReferralError {
    fn from(err: ValidationError) -> Self {
        ReferralError::validation(err.field().to_string(), err.to_string())
    }
}

impl From<ReferralError> for DomainError {
    fn from(err: ReferralError) -> Self {
        DomainError::new(err.code(), err.message())
    }
}
