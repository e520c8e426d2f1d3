//! PostgreSQL implementation of ProfileRepository.

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::domain::referral::{Profile, ReferralCode, TaxId};
use crate::ports::ProfileRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

const PROFILE_COLUMNS: &str = "user_id, referral_code, referred_by, email, display_name, \
     tax_id, gateway_customer_id, created_at";

pub struct PostgresProfileRepository {
    pool: PgPool,
}

impl PostgresProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, user_id: &UserId) -> Result<Option<Profile>, DomainError> {
        let query = format!("SELECT {} FROM profiles WHERE user_id = $1", PROFILE_COLUMNS);
        let row: Option<ProfileRow> = sqlx::query_as(&query)
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to find profile: {}", e)))?;

        row.map(Profile::try_from).transpose()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    user_id: String,
    referral_code: String,
    referred_by: Option<String>,
    email: Option<String>,
    display_name: Option<String>,
    tax_id: Option<String>,
    gateway_customer_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = DomainError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let corrupt = |field: &str, e: String| {
            DomainError::database(format!("Invalid {} in profiles: {}", field, e))
        };

        Ok(Profile {
            user_id: UserId::new(row.user_id).map_err(|e| corrupt("user_id", e.to_string()))?,
            referral_code: ReferralCode::parse(&row.referral_code)
                .map_err(|e| corrupt("referral_code", e.to_string()))?,
            referred_by: row
                .referred_by
                .as_deref()
                .map(ReferralCode::parse)
                .transpose()
                .map_err(|e| corrupt("referred_by", e.to_string()))?,
            email: row.email,
            display_name: row.display_name,
            tax_id: row
                .tax_id
                .as_deref()
                .map(TaxId::parse)
                .transpose()
                .map_err(|e| corrupt("tax_id", e.to_string()))?,
            gateway_customer_id: row.gateway_customer_id,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[async_trait]
impl ProfileRepository for PostgresProfileRepository {
    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Profile>, DomainError> {
        self.fetch(user_id).await
    }

    async fn find_by_referral_code(&self, code: &ReferralCode) -> Result<Option<Profile>, DomainError> {
        let query = format!("SELECT {} FROM profiles WHERE referral_code = $1", PROFILE_COLUMNS);
        let row: Option<ProfileRow> = sqlx::query_as(&query)
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to resolve referral code: {}", e)))?;

        row.map(Profile::try_from).transpose()
    }

    async fn insert_if_absent(&self, profile: &Profile) -> Result<Profile, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO profiles (
                user_id, referral_code, referred_by, email, display_name,
                tax_id, gateway_customer_id, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(profile.user_id.as_str())
        .bind(profile.referral_code.as_str())
        .bind(profile.referred_by.as_ref().map(|c| c.as_str()))
        .bind(&profile.email)
        .bind(&profile.display_name)
        .bind(profile.tax_id.as_ref().map(|t| t.as_str()))
        .bind(&profile.gateway_customer_id)
        .bind(profile.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("profiles_referral_code_key") {
                    return DomainError::new(
                        ErrorCode::ConstraintViolation,
                        "Referral code already in use",
                    );
                }
            }
            DomainError::database(format!("Failed to insert profile: {}", e))
        })?;

        self.fetch(&profile.user_id).await?.ok_or_else(|| {
            DomainError::database(format!("Profile for {} vanished after insert", profile.user_id))
        })
    }

    async fn set_referred_by_if_unset(
        &self,
        user_id: &UserId,
        code: &ReferralCode,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "UPDATE profiles SET referred_by = $2 WHERE user_id = $1 AND referred_by IS NULL",
        )
        .bind(user_id.as_str())
        .bind(code.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to set referred_by: {}", e)))?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_gateway_customer_id_if_unset(
        &self,
        user_id: &UserId,
        customer_id: &str,
    ) -> Result<String, DomainError> {
        let stored: Option<(Option<String>,)> = sqlx::query_as(
            r#"
            UPDATE profiles
            SET gateway_customer_id = COALESCE(gateway_customer_id, $2)
            WHERE user_id = $1
            RETURNING gateway_customer_id
            "#,
        )
        .bind(user_id.as_str())
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to set gateway customer: {}", e)))?;

        match stored {
            Some((Some(id),)) => Ok(id),
            _ => Err(DomainError::new(
                ErrorCode::ProfileNotFound,
                format!("No profile for {}", user_id),
            )),
        }
    }

    async fn update_tax_id(&self, user_id: &UserId, tax_id: &TaxId) -> Result<(), DomainError> {
        let result = sqlx::query("UPDATE profiles SET tax_id = $2 WHERE user_id = $1")
            .bind(user_id.as_str())
            .bind(tax_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to update tax id: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::ProfileNotFound,
                format!("No profile for {}", user_id),
            ));
        }
        Ok(())
    }
}
