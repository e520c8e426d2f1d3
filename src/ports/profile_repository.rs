//! Profile repository port.
//!
//! Write-once fields (`referred_by`, `gateway_customer_id`) get dedicated
//! conditional setters so that concurrent requests cannot overwrite them.

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::referral::{Profile, ReferralCode, TaxId};
use async_trait::async_trait;

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Profile>, DomainError>;

    /// Resolve a referral code to the profile that owns it.
    async fn find_by_referral_code(&self, code: &ReferralCode) -> Result<Option<Profile>, DomainError>;

    /// Insert the profile unless one already exists for the user.
    ///
    /// Returns the stored profile, which is the existing one on conflict.
    async fn insert_if_absent(&self, profile: &Profile) -> Result<Profile, DomainError>;

    /// Set `referred_by` only if it is still unset.
    ///
    /// Returns `false` when a referrer was already recorded.
    async fn set_referred_by_if_unset(
        &self,
        user_id: &UserId,
        code: &ReferralCode,
    ) -> Result<bool, DomainError>;

    /// Set the gateway customer id only if it is still unset.
    ///
    /// Returns the id that ended up stored, which is the earlier one if a
    /// concurrent request won.
    async fn set_gateway_customer_id_if_unset(
        &self,
        user_id: &UserId,
        customer_id: &str,
    ) -> Result<String, DomainError>;

    async fn update_tax_id(&self, user_id: &UserId, tax_id: &TaxId) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn ProfileRepository) {}
    }
}
