//! ApplyReferralCodeHandler - Records who referred the current user.

use std::sync::Arc;

use crate::application::handlers::profiles::ensure_profile;
use crate::domain::foundation::{AuthenticatedUser, UserId};
use crate::domain::referral::{ReferralCode, ReferralError};
use crate::ports::ProfileRepository;

#[derive(Debug, Clone)]
pub struct ApplyReferralCodeCommand {
    pub user: AuthenticatedUser,
    pub code: String,
}

#[derive(Debug, Clone)]
pub struct ApplyReferralCodeResult {
    pub referred_by: ReferralCode,
    pub referrer_id: UserId,
}

/// Sets `referred_by` at most once.
pub struct ApplyReferralCodeHandler {
    profiles: Arc<dyn ProfileRepository>,
}

impl ApplyReferralCodeHandler {
    pub fn new(profiles: Arc<dyn ProfileRepository>) -> Self {
        Self { profiles }
    }

    pub async fn handle(&self, cmd: ApplyReferralCodeCommand) -> Result<ApplyReferralCodeResult, ReferralError> {
        let code = ReferralCode::parse(&cmd.code)?;
        let mut profile = ensure_profile(self.profiles.as_ref(), &cmd.user).await?;

        // Own code and second application are rejected before any lookup.
        profile.apply_referral(code.clone())?;

        let referrer = self
            .profiles
            .find_by_referral_code(&code)
            .await?
            .ok_or_else(|| ReferralError::code_not_found(code.as_str()))?;

        if !self.profiles.set_referred_by_if_unset(&profile.user_id, &code).await? {
            return Err(ReferralError::AlreadyReferred(profile.user_id));
        }

        tracing::info!(
            user_id = %profile.user_id,
            referrer_id = %referrer.user_id,
            "Referral code applied"
        );

        Ok(ApplyReferralCodeResult {
            referred_by: code,
            referrer_id: referrer.user_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::domain::referral::Profile;

    fn user(id: &str) -> AuthenticatedUser {
        AuthenticatedUser::new(UserId::new(id).unwrap(), None, None)
    }

    async fn referrer(store: &InMemoryStore) -> Profile {
        store
            .insert_if_absent(&Profile::new(UserId::new("referrer").unwrap(), None, None))
            .await
            .unwrap()
    }

    fn apply(user_id: &str, code: &str) -> ApplyReferralCodeCommand {
        ApplyReferralCodeCommand {
            user: user(user_id),
            code: code.to_string(),
        }
    }

    #[tokio::test]
    async fn applies_normalized_code() {
        let store = InMemoryStore::new();
        let referrer = referrer(&store).await;
        let handler = ApplyReferralCodeHandler::new(Arc::new(store.clone()));

        let raw = format!("  {}  ", referrer.referral_code.as_str().to_lowercase());
        let result = handler.handle(apply("newbie", &raw)).await.unwrap();

        assert_eq!(result.referrer_id, referrer.user_id);
        let stored = store
            .find_by_user_id(&UserId::new("newbie").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.referred_by, Some(referrer.referral_code));
    }

    #[tokio::test]
    async fn second_application_conflicts() {
        let store = InMemoryStore::new();
        let referrer = referrer(&store).await;
        let handler = ApplyReferralCodeHandler::new(Arc::new(store.clone()));

        handler.handle(apply("newbie", referrer.referral_code.as_str())).await.unwrap();
        let err = handler
            .handle(apply("newbie", referrer.referral_code.as_str()))
            .await
            .unwrap_err();

        assert!(matches!(err, ReferralError::AlreadyReferred(_)));
    }

    #[tokio::test]
    async fn own_code_is_self_referral() {
        let store = InMemoryStore::new();
        let referrer = referrer(&store).await;
        let handler = ApplyReferralCodeHandler::new(Arc::new(store.clone()));

        let err = handler
            .handle(apply("referrer", referrer.referral_code.as_str()))
            .await
            .unwrap_err();
        assert_eq!(err, ReferralError::SelfReferral);
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() {
        let store = InMemoryStore::new();
        let handler = ApplyReferralCodeHandler::new(Arc::new(store.clone()));

        let err = handler.handle(apply("newbie", "ZZZZ9999")).await.unwrap_err();
        assert!(matches!(err, ReferralError::CodeNotFound(_)));

        // Nothing recorded, so a valid code still works later.
        let profile = store
            .find_by_user_id(&UserId::new("newbie").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(profile.referred_by.is_none());
    }

    #[tokio::test]
    async fn malformed_code_is_validation_error() {
        let store = InMemoryStore::new();
        let handler = ApplyReferralCodeHandler::new(Arc::new(store));
        let err = handler.handle(apply("newbie", "a!")).await.unwrap_err();
        assert!(matches!(err, ReferralError::ValidationFailed { .. }));
    }
}
