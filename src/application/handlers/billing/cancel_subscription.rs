//! CancelSubscriptionHandler - User-initiated cancellation.

use std::sync::Arc;

use crate::domain::billing::{BillingError, Subscription, SubscriptionStatus};
use crate::domain::foundation::{StateMachine, Timestamp, UserId};
use crate::ports::{PaymentGateway, SubscriptionRepository};

#[derive(Debug, Clone)]
pub struct CancelSubscriptionCommand {
    pub user_id: UserId,
}

#[derive(Debug, Clone)]
pub struct CancelSubscriptionResult {
    pub subscription: Subscription,

    /// Access continues until the existing paid-through date.
    pub access_until: Option<Timestamp>,
}

/// Handler for cancelling subscriptions.
///
/// The gateway subscription is stopped first; only then is the local row
/// marked `canceled`. The paid-through date is kept.
pub struct CancelSubscriptionHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    gateway: Arc<dyn PaymentGateway>,
}

impl CancelSubscriptionHandler {
    pub fn new(subscriptions: Arc<dyn SubscriptionRepository>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { subscriptions, gateway }
    }

    pub async fn handle(&self, cmd: CancelSubscriptionCommand) -> Result<CancelSubscriptionResult, BillingError> {
        let subscription = self
            .subscriptions
            .find_by_user_id(&cmd.user_id)
            .await?
            .ok_or_else(|| BillingError::not_found(cmd.user_id.clone()))?;

        if !subscription.status.can_transition_to(&SubscriptionStatus::Canceled) {
            return Err(BillingError::InvalidState {
                current: subscription.status.to_string(),
                attempted: SubscriptionStatus::Canceled.to_string(),
            });
        }

        if let Some(gateway_id) = &subscription.gateway_subscription_id {
            self.gateway.cancel_subscription(gateway_id).await?;
        }

        // Re-read under lock: a reward may have moved the period end meanwhile.
        let subscription = self
            .subscriptions
            .mark_canceled(&cmd.user_id)
            .await?
            .ok_or_else(|| BillingError::not_found(cmd.user_id.clone()))?;

        tracing::info!(
            user_id = %cmd.user_id,
            access_until = ?subscription.current_period_end.map(|t| t.date_string()),
            "Subscription canceled"
        );

        Ok(CancelSubscriptionResult {
            access_until: subscription.current_period_end,
            subscription,
        })
    }
}
