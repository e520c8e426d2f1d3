//! Lazy profile provisioning shared by the user-facing handlers.

use crate::domain::foundation::{AuthenticatedUser, DomainError, ErrorCode};
use crate::domain::referral::Profile;
use crate::ports::ProfileRepository;

/// Fresh referral codes drawn before giving up on collisions.
const CODE_ATTEMPTS: usize = 3;

/// Returns the user's profile, creating it on first use.
///
/// A generated referral code that collides with an existing one is
/// regenerated; any other store failure is returned as is.
pub(crate) async fn ensure_profile(
    profiles: &dyn ProfileRepository,
    user: &AuthenticatedUser,
) -> Result<Profile, DomainError> {
    if let Some(profile) = profiles.find_by_user_id(&user.id).await? {
        return Ok(profile);
    }

    let mut last_error = None;
    for _ in 0..CODE_ATTEMPTS {
        let candidate = Profile::new(user.id.clone(), user.email.clone(), user.display_name.clone());
        match profiles.insert_if_absent(&candidate).await {
            Ok(profile) => {
                if profile.referral_code == candidate.referral_code {
                    tracing::info!(user_id = %user.id, "Profile created");
                }
                return Ok(profile);
            }
            Err(e) if e.code == ErrorCode::ConstraintViolation => {
                tracing::debug!(user_id = %user.id, "Referral code collision, regenerating");
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| DomainError::new(ErrorCode::InternalError, "Profile creation failed")))
}
