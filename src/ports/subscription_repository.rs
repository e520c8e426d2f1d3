//! Subscription repository port.
//!
//! The authoritative record of each user's plan, status, and paid-through
//! date. One row per user.
//!
//! Webhooks, reward grants, pull sync, and cancellation can all touch the
//! same row concurrently. Each of them goes through an operation that reads
//! and writes under one row lock and writes only the columns it owns. `save`
//! overwrites the whole row and is reserved for checkout, which replaces the
//! row's binding anyway.

use crate::domain::billing::{EventOutcome, GatewayEvent, Subscription};
use crate::domain::foundation::{DomainError, Timestamp, UserId};
use async_trait::async_trait;

/// A payment event applied to the row it was bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedEvent {
    /// Row as it stands after the event (unchanged when stale).
    pub subscription: Subscription,
    pub outcome: EventOutcome,
}

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Find the subscription owned by a user.
    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Subscription>, DomainError>;

    /// Find the subscription currently bound to a gateway subscription id.
    ///
    /// Returns `None` for ids that were never persisted or were replaced by
    /// a later checkout.
    async fn find_by_gateway_subscription_id(
        &self,
        gateway_subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError>;

    /// Insert or overwrite the row keyed by `user_id`.
    ///
    /// # Errors
    ///
    /// - `ConstraintViolation` if the gateway subscription id is bound to
    ///   another user
    /// - `DatabaseError` on persistence failure
    async fn save(&self, subscription: &Subscription) -> Result<(), DomainError>;

    /// Applies a payment event to the row bound to
    /// `event.gateway_subscription_id`, reading and writing under one lock.
    ///
    /// Writes only status, `last_event_at`, and (for settlements)
    /// `current_period_end`. Stale events write nothing. Returns `None`
    /// when no row carries the gateway id.
    async fn apply_payment_event(&self, event: &GatewayEvent) -> Result<Option<AppliedEvent>, DomainError>;

    /// Adopts `active` through `next_due_date` on the row bound to
    /// `gateway_subscription_id`, unless it is already active.
    ///
    /// Returns `true` when the row changed. Never touches `last_event_at`.
    async fn adopt_gateway_active(
        &self,
        gateway_subscription_id: &str,
        next_due_date: Timestamp,
    ) -> Result<bool, DomainError>;

    /// Marks the user's row `canceled`, leaving every other column as is.
    ///
    /// Returns `None` when the user has no row.
    ///
    /// # Errors
    ///
    /// - `InvalidStateTransition` if the row is already canceled
    async fn mark_canceled(&self, user_id: &UserId) -> Result<Option<Subscription>, DomainError>;
}
