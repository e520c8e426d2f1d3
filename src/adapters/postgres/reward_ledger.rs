//! PostgreSQL implementation of RewardLedger.
//!
//! The grant runs in one transaction:
//!
//! 1. insert the ledger row with `ON CONFLICT DO NOTHING`; zero rows means
//!    the pair was already rewarded, so roll back
//! 2. lock the referrer's subscription row (`FOR UPDATE`)
//! 3. extend it, or create it if the referrer never subscribed
//! 4. commit
//!
//! The `UNIQUE (referrer_id, referred_user_id)` constraint is what makes
//! concurrent duplicate grants collapse into one.

use crate::domain::billing::Subscription;
use crate::domain::foundation::{DomainError, RewardId, Timestamp, UserId};
use crate::domain::referral::ReferralReward;
use crate::ports::{RewardApplication, RewardLedger};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::subscription_repository::{lock_by_user_id, write_status_and_period};

pub struct PostgresRewardLedger {
    pool: PgPool,
}

impl PostgresRewardLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RewardRow {
    id: Uuid,
    referrer_id: String,
    referred_user_id: String,
    reward_days: i32,
    granted_at: DateTime<Utc>,
}

impl TryFrom<RewardRow> for ReferralReward {
    type Error = DomainError;

    fn try_from(row: RewardRow) -> Result<Self, Self::Error> {
        let user = |raw: String| {
            UserId::new(raw)
                .map_err(|e| DomainError::database(format!("Invalid user id in referral_rewards: {}", e)))
        };
        Ok(ReferralReward {
            id: RewardId::from_uuid(row.id),
            referrer_id: user(row.referrer_id)?,
            referred_user_id: user(row.referred_user_id)?,
            reward_days: i64::from(row.reward_days),
            granted_at: Timestamp::from_datetime(row.granted_at),
        })
    }
}

async fn extend_locked(
    conn: &mut PgConnection,
    mut subscription: Subscription,
    reward: &ReferralReward,
) -> Result<Timestamp, DomainError> {
    let new_end = subscription.extend_for_reward(reward.granted_at, reward.reward_days)?;
    write_status_and_period(&mut *conn, &subscription).await?;
    Ok(new_end)
}

#[async_trait]
impl RewardLedger for PostgresRewardLedger {
    async fn has_reward(
        &self,
        referrer_id: &UserId,
        referred_user_id: &UserId,
    ) -> Result<bool, DomainError> {
        let exists: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM referral_rewards
                WHERE referrer_id = $1 AND referred_user_id = $2
            )
            "#,
        )
        .bind(referrer_id.as_str())
        .bind(referred_user_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to check reward ledger: {}", e)))?;

        Ok(exists.0)
    }

    async fn apply_reward(&self, reward: &ReferralReward) -> Result<RewardApplication, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database(format!("Failed to begin transaction: {}", e)))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO referral_rewards (id, referrer_id, referred_user_id, reward_days, granted_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (referrer_id, referred_user_id) DO NOTHING
            "#,
        )
        .bind(reward.id.as_uuid())
        .bind(reward.referrer_id.as_str())
        .bind(reward.referred_user_id.as_str())
        .bind(reward.reward_days as i32)
        .bind(reward.granted_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::database(format!("Failed to insert reward: {}", e)))?;

        if inserted.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| DomainError::database(format!("Failed to roll back: {}", e)))?;
            return Ok(RewardApplication::AlreadyGranted);
        }

        let new_period_end = match lock_by_user_id(&mut tx, &reward.referrer_id).await? {
            Some(subscription) => extend_locked(&mut tx, subscription, reward).await?,
            None => {
                let fresh = Subscription::rewarded(
                    reward.referrer_id.clone(),
                    reward.granted_at,
                    reward.reward_days,
                );
                let created = sqlx::query(
                    r#"
                    INSERT INTO subscriptions (
                        user_id, gateway_subscription_id, plan, status,
                        current_period_end, last_event_at, created_at, updated_at
                    ) VALUES ($1, NULL, $2, $3, $4, NULL, $5, $5)
                    ON CONFLICT (user_id) DO NOTHING
                    "#,
                )
                .bind(fresh.user_id.as_str())
                .bind(fresh.plan.as_str())
                .bind(fresh.status.as_str())
                .bind(fresh.current_period_end.map(|t| *t.as_datetime()))
                .bind(fresh.created_at.as_datetime())
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::database(format!("Failed to create subscription: {}", e)))?;

                if created.rows_affected() == 1 {
                    reward.granted_at.add_days(reward.reward_days)
                } else {
                    // A concurrent checkout or reward created the row first.
                    let subscription = lock_by_user_id(&mut tx, &reward.referrer_id)
                        .await?
                        .ok_or_else(|| {
                            DomainError::database("Subscription row missing after conflict")
                        })?;
                    extend_locked(&mut tx, subscription, reward).await?
                }
            }
        };

        tx.commit()
            .await
            .map_err(|e| DomainError::database(format!("Failed to commit reward: {}", e)))?;

        Ok(RewardApplication::Granted { new_period_end })
    }

    async fn list_for_referrer(&self, referrer_id: &UserId) -> Result<Vec<ReferralReward>, DomainError> {
        let rows: Vec<RewardRow> = sqlx::query_as(
            r#"
            SELECT id, referrer_id, referred_user_id, reward_days, granted_at
            FROM referral_rewards
            WHERE referrer_id = $1
            ORDER BY granted_at DESC
            "#,
        )
        .bind(referrer_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to list rewards: {}", e)))?;

        rows.into_iter().map(ReferralReward::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_converts_to_reward() {
        let row = RewardRow {
            id: Uuid::new_v4(),
            referrer_id: "referrer".to_string(),
            referred_user_id: "referred".to_string(),
            reward_days: 30,
            granted_at: Utc::now(),
        };
        let reward = ReferralReward::try_from(row).unwrap();
        assert_eq!(reward.reward_days, 30);
        assert_eq!(reward.referrer_id.as_str(), "referrer");
    }

    #[test]
    fn empty_user_id_is_rejected() {
        let row = RewardRow {
            id: Uuid::new_v4(),
            referrer_id: String::new(),
            referred_user_id: "referred".to_string(),
            reward_days: 30,
            granted_at: Utc::now(),
        };
        assert!(ReferralReward::try_from(row).is_err());
    }
}
