//! PostgreSQL implementation of SubscriptionRepository.
//!
//! Everything except checkout's `save` follows one shape: begin, lock the
//! row with `SELECT ... FOR UPDATE`, apply the domain rule, then `UPDATE`
//! only the columns that rule owns. Reward grants lock the same row, so a
//! payment event can never write back a period end it read before a grant.

use crate::domain::billing::{EventOutcome, GatewayEvent, Plan, Subscription, SubscriptionStatus};
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::ports::{AppliedEvent, SubscriptionRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

const SUBSCRIPTION_COLUMNS: &str = "user_id, gateway_subscription_id, plan, status, \
     current_period_end, last_event_at, created_at, updated_at";

const GATEWAY_ID_CONSTRAINT: &str = "subscriptions_gateway_subscription_id_key";

pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a subscription.
#[derive(Debug, sqlx::FromRow)]
pub(super) struct SubscriptionRow {
    user_id: String,
    gateway_subscription_id: Option<String>,
    plan: String,
    status: String,
    current_period_end: Option<DateTime<Utc>>,
    last_event_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(Subscription {
            user_id: UserId::new(row.user_id).map_err(|e| {
                DomainError::database(format!("Invalid user_id in subscriptions: {}", e))
            })?,
            gateway_subscription_id: row.gateway_subscription_id,
            plan: parse_plan(&row.plan)?,
            status: parse_status(&row.status)?,
            current_period_end: row.current_period_end.map(Timestamp::from_datetime),
            last_event_at: row.last_event_at.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

fn parse_plan(s: &str) -> Result<Plan, DomainError> {
    s.parse()
        .map_err(|_| DomainError::database(format!("Invalid plan value: {}", s)))
}

fn parse_status(s: &str) -> Result<SubscriptionStatus, DomainError> {
    s.parse()
        .map_err(|_| DomainError::database(format!("Invalid status value: {}", s)))
}

/// Upserts a subscription row on any executor (pool or open transaction).
async fn upsert_subscription<'e, E>(
    executor: E,
    subscription: &Subscription,
) -> Result<(), DomainError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO subscriptions (
            user_id, gateway_subscription_id, plan, status,
            current_period_end, last_event_at, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (user_id) DO UPDATE SET
            gateway_subscription_id = EXCLUDED.gateway_subscription_id,
            plan = EXCLUDED.plan,
            status = EXCLUDED.status,
            current_period_end = EXCLUDED.current_period_end,
            last_event_at = EXCLUDED.last_event_at,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(subscription.user_id.as_str())
    .bind(&subscription.gateway_subscription_id)
    .bind(subscription.plan.as_str())
    .bind(subscription.status.as_str())
    .bind(subscription.current_period_end.map(|t| *t.as_datetime()))
    .bind(subscription.last_event_at.map(|t| *t.as_datetime()))
    .bind(subscription.created_at.as_datetime())
    .bind(subscription.updated_at.as_datetime())
    .execute(executor)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.constraint() == Some(GATEWAY_ID_CONSTRAINT) {
                return DomainError::new(
                    ErrorCode::ConstraintViolation,
                    "Gateway subscription id already bound to another user",
                );
            }
        }
        DomainError::database(format!("Failed to save subscription: {}", e))
    })?;

    Ok(())
}

/// Locks the user's row for the rest of the transaction.
pub(super) async fn lock_by_user_id(
    conn: &mut PgConnection,
    user_id: &UserId,
) -> Result<Option<Subscription>, DomainError> {
    let query = format!(
        "SELECT {} FROM subscriptions WHERE user_id = $1 FOR UPDATE",
        SUBSCRIPTION_COLUMNS
    );
    let row: Option<SubscriptionRow> = sqlx::query_as(&query)
        .bind(user_id.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| DomainError::database(format!("Failed to lock subscription: {}", e)))?;

    row.map(Subscription::try_from).transpose()
}

async fn lock_by_gateway_id(
    conn: &mut PgConnection,
    gateway_subscription_id: &str,
) -> Result<Option<Subscription>, DomainError> {
    let query = format!(
        "SELECT {} FROM subscriptions WHERE gateway_subscription_id = $1 FOR UPDATE",
        SUBSCRIPTION_COLUMNS
    );
    let row: Option<SubscriptionRow> = sqlx::query_as(&query)
        .bind(gateway_subscription_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| DomainError::database(format!("Failed to lock subscription: {}", e)))?;

    row.map(Subscription::try_from).transpose()
}

/// Writes status and paid-through date of a locked row.
pub(super) async fn write_status_and_period(
    conn: &mut PgConnection,
    subscription: &Subscription,
) -> Result<(), DomainError> {
    sqlx::query(
        r#"
        UPDATE subscriptions
        SET status = $2, current_period_end = $3, updated_at = $4
        WHERE user_id = $1
        "#,
    )
    .bind(subscription.user_id.as_str())
    .bind(subscription.status.as_str())
    .bind(subscription.current_period_end.map(|t| *t.as_datetime()))
    .bind(subscription.updated_at.as_datetime())
    .execute(&mut *conn)
    .await
    .map_err(|e| DomainError::database(format!("Failed to update subscription: {}", e)))?;

    Ok(())
}

/// Writes the columns a payment event owns. Overdue leaves the period end alone.
async fn write_event(
    conn: &mut PgConnection,
    subscription: &Subscription,
    outcome: EventOutcome,
) -> Result<(), DomainError> {
    let query = match outcome {
        EventOutcome::Activated { .. } => sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = $2, last_event_at = $3, updated_at = $4, current_period_end = $5
            WHERE user_id = $1
            "#,
        ),
        EventOutcome::MarkedOverdue => sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = $2, last_event_at = $3, updated_at = $4
            WHERE user_id = $1
            "#,
        ),
        EventOutcome::Stale { .. } => return Ok(()),
    };

    let mut query = query
        .bind(subscription.user_id.as_str())
        .bind(subscription.status.as_str())
        .bind(subscription.last_event_at.map(|t| *t.as_datetime()))
        .bind(subscription.updated_at.as_datetime());
    if let EventOutcome::Activated { period_end } = outcome {
        query = query.bind(*period_end.as_datetime());
    }

    query
        .execute(&mut *conn)
        .await
        .map_err(|e| DomainError::database(format!("Failed to apply payment event: {}", e)))?;

    Ok(())
}

impl PostgresSubscriptionRepository {
    async fn begin(&self) -> Result<Transaction<'static, Postgres>, DomainError> {
        self.pool
            .begin()
            .await
            .map_err(|e| DomainError::database(format!("Failed to begin transaction: {}", e)))
    }
}

async fn commit(tx: Transaction<'static, Postgres>) -> Result<(), DomainError> {
    tx.commit()
        .await
        .map_err(|e| DomainError::database(format!("Failed to commit: {}", e)))
}

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Subscription>, DomainError> {
        let query = format!("SELECT {} FROM subscriptions WHERE user_id = $1", SUBSCRIPTION_COLUMNS);
        let row: Option<SubscriptionRow> = sqlx::query_as(&query)
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to find subscription: {}", e)))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn find_by_gateway_subscription_id(
        &self,
        gateway_subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        let query = format!(
            "SELECT {} FROM subscriptions WHERE gateway_subscription_id = $1",
            SUBSCRIPTION_COLUMNS
        );
        let row: Option<SubscriptionRow> = sqlx::query_as(&query)
            .bind(gateway_subscription_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                DomainError::database(format!("Failed to find subscription by gateway id: {}", e))
            })?;

        row.map(Subscription::try_from).transpose()
    }

    async fn save(&self, subscription: &Subscription) -> Result<(), DomainError> {
        upsert_subscription(&self.pool, subscription).await
    }

    async fn apply_payment_event(&self, event: &GatewayEvent) -> Result<Option<AppliedEvent>, DomainError> {
        let mut tx = self.begin().await?;
        let Some(mut subscription) = lock_by_gateway_id(&mut tx, &event.gateway_subscription_id).await? else {
            return Ok(None);
        };

        let outcome = subscription.apply_payment_event(event)?;
        write_event(&mut tx, &subscription, outcome).await?;
        commit(tx).await?;

        Ok(Some(AppliedEvent { subscription, outcome }))
    }

    async fn adopt_gateway_active(
        &self,
        gateway_subscription_id: &str,
        next_due_date: Timestamp,
    ) -> Result<bool, DomainError> {
        let mut tx = self.begin().await?;
        let Some(mut subscription) = lock_by_gateway_id(&mut tx, gateway_subscription_id).await? else {
            return Ok(false);
        };

        if !subscription.adopt_gateway_active(next_due_date)? {
            return Ok(false);
        }
        write_status_and_period(&mut tx, &subscription).await?;
        commit(tx).await?;
        Ok(true)
    }

    async fn mark_canceled(&self, user_id: &UserId) -> Result<Option<Subscription>, DomainError> {
        let mut tx = self.begin().await?;
        let Some(mut subscription) = lock_by_user_id(&mut tx, user_id).await? else {
            return Ok(None);
        };

        subscription.cancel()?;
        sqlx::query("UPDATE subscriptions SET status = $2, updated_at = $3 WHERE user_id = $1")
            .bind(subscription.user_id.as_str())
            .bind(subscription.status.as_str())
            .bind(subscription.updated_at.as_datetime())
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::database(format!("Failed to cancel subscription: {}", e)))?;
        commit(tx).await?;

        Ok(Some(subscription))
    }
}
