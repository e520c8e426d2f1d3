//! Error body shared by every JSON endpoint.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::ErrorCode;

/// `{"error": <message>, "code": <ERROR_CODE>}`
///
/// Messages are generic and safe to show users. Internal detail goes to
/// the log instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: code.to_string(),
        }
    }
}
