//! User profile as seen by billing and referrals.

use std::fmt;

use crate::domain::foundation::{Timestamp, UserId, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ReferralError;

const GENERATED_CODE_LEN: usize = 8;
const MIN_CODE_LEN: usize = 4;
const MAX_CODE_LEN: usize = 32;

/// Shareable referral code. Stored normalized (trimmed, uppercase).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferralCode(String);

impl ReferralCode {
    /// Generates a fresh 8-character uppercase alphanumeric code.
    pub fn generate() -> Self {
        let raw = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
        Self(raw[..GENERATED_CODE_LEN].to_string())
    }

    /// Normalizes and validates a user-supplied code.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let code = raw.trim().to_ascii_uppercase();
        if code.is_empty() {
            return Err(ValidationError::empty_field("code"));
        }
        if !(MIN_CODE_LEN..=MAX_CODE_LEN).contains(&code.len()) {
            return Err(ValidationError::invalid_format(
                "code",
                format!("must be {}-{} characters", MIN_CODE_LEN, MAX_CODE_LEN),
            ));
        }
        if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ValidationError::invalid_format("code", "must be alphanumeric"));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferralCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Brazilian taxpayer id (CPF or CNPJ), digits only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxId(String);

impl TaxId {
    /// Strips punctuation and accepts 11 (CPF) or 14 (CNPJ) digits.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let digits: String = raw
            .chars()
            .filter(|c| !matches!(c, '.' | '-' | '/' | ' '))
            .collect();
        if digits.is_empty() {
            return Err(ValidationError::empty_field("tax_id"));
        }
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::invalid_format("tax_id", "must contain only digits"));
        }
        if digits.len() != 11 && digits.len() != 14 {
            return Err(ValidationError::invalid_format("tax_id", "must have 11 or 14 digits"));
        }
        Ok(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Profile row. One per user, created lazily on first authenticated use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: UserId,

    /// Immutable once generated.
    pub referral_code: ReferralCode,

    /// Code of the referrer. Set at most once.
    pub referred_by: Option<ReferralCode>,

    pub email: Option<String>,
    pub display_name: Option<String>,
    pub tax_id: Option<TaxId>,

    /// Gateway customer id. Never regenerated once set.
    pub gateway_customer_id: Option<String>,

    pub created_at: Timestamp,
}

impl Profile {
    pub fn new(user_id: UserId, email: Option<String>, display_name: Option<String>) -> Self {
        Self {
            user_id,
            referral_code: ReferralCode::generate(),
            referred_by: None,
            email,
            display_name,
            tax_id: None,
            gateway_customer_id: None,
            created_at: Timestamp::now(),
        }
    }

    /// Records who referred this user.
    ///
    /// # Errors
    ///
    /// - `SelfReferral` if `code` is this profile's own code
    /// - `AlreadyReferred` if a referrer was already recorded
    pub fn apply_referral(&mut self, code: ReferralCode) -> Result<(), ReferralError> {
        if code == self.referral_code {
            return Err(ReferralError::SelfReferral);
        }
        if self.referred_by.is_some() {
            return Err(ReferralError::AlreadyReferred(self.user_id.clone()));
        }
        self.referred_by = Some(code);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> Profile {
        Profile::new(UserId::new("user-1").unwrap(), None, None)
    }

    #[test]
    fn generated_codes_are_eight_uppercase_alphanumerics() {
        let code = ReferralCode::generate();
        assert_eq!(code.as_str().len(), 8);
        assert!(code
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn parse_normalizes_case_and_whitespace() {
        assert_eq!(ReferralCode::parse("  ab12cd34 ").unwrap().as_str(), "AB12CD34");
    }

    #[test]
    fn parse_rejects_symbols_and_bad_length() {
        assert!(ReferralCode::parse("AB-12").is_err());
        assert!(ReferralCode::parse("AB").is_err());
        assert!(ReferralCode::parse("").is_err());
    }

    #[test]
    fn tax_id_strips_punctuation() {
        assert_eq!(TaxId::parse("123.456.789-09").unwrap().as_str(), "12345678909");
        assert_eq!(
            TaxId::parse("12.345.678/0001-95").unwrap().as_str(),
            "12345678000195"
        );
    }

    #[test]
    fn tax_id_rejects_wrong_length_or_letters() {
        assert!(TaxId::parse("1234").is_err());
        assert!(TaxId::parse("1234567890a").is_err());
        assert!(TaxId::parse("").is_err());
    }

    #[test]
    fn apply_referral_sets_once() {
        let mut p = profile();
        let code = ReferralCode::parse("FRIEND01").unwrap();
        p.apply_referral(code.clone()).unwrap();
        assert_eq!(p.referred_by, Some(code));

        let err = p.apply_referral(ReferralCode::parse("OTHER001").unwrap()).unwrap_err();
        assert!(matches!(err, ReferralError::AlreadyReferred(_)));
    }

    #[test]
    fn apply_referral_rejects_own_code() {
        let mut p = profile();
        let own = p.referral_code.clone();
        assert_eq!(p.apply_referral(own), Err(ReferralError::SelfReferral));
        assert_eq!(p.referred_by, None);
    }
}
