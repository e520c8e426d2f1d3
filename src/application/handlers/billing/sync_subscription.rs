//! SyncSubscriptionHandler - Pull-based catch-up reconciliation.
//!
//! Webhooks can be lost. When the gateway reports the subscription `ACTIVE`
//! and the local row disagrees, the row adopts `active` with the gateway's
//! next due date as its period end. Never triggers referral rewards and
//! never touches the last-applied event timestamp.

use std::sync::Arc;

use crate::domain::billing::{BillingError, SubscriptionStatus};
use crate::domain::foundation::{Timestamp, UserId};
use crate::ports::{GatewaySubscriptionStatus, PaymentGateway, SubscriptionRepository};

#[derive(Debug, Clone)]
pub struct SyncSubscriptionCommand {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    NoSubscription,

    /// Local row has no gateway subscription to ask about.
    NotLinked,

    Unchanged,

    Adopted { period_end: Timestamp },
}

pub struct SyncSubscriptionHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    gateway: Arc<dyn PaymentGateway>,
}

impl SyncSubscriptionHandler {
    pub fn new(subscriptions: Arc<dyn SubscriptionRepository>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { subscriptions, gateway }
    }

    pub async fn handle(&self, cmd: SyncSubscriptionCommand) -> Result<SyncOutcome, BillingError> {
        let Some(subscription) = self.subscriptions.find_by_user_id(&cmd.user_id).await? else {
            return Ok(SyncOutcome::NoSubscription);
        };
        let Some(gateway_id) = subscription.gateway_subscription_id.clone() else {
            return Ok(SyncOutcome::NotLinked);
        };

        let snapshot = self.gateway.get_subscription(&gateway_id).await?;
        if snapshot.status != GatewaySubscriptionStatus::Active {
            return Ok(SyncOutcome::Unchanged);
        }

        let Some(next_due) = snapshot.next_due_date else {
            tracing::warn!(
                user_id = %cmd.user_id,
                gateway_subscription_id = %gateway_id,
                "Gateway reports active subscription without next due date"
            );
            return Ok(SyncOutcome::Unchanged);
        };

        if subscription.status == SubscriptionStatus::Active {
            return Ok(SyncOutcome::Unchanged);
        }
        if !self
            .subscriptions
            .adopt_gateway_active(&gateway_id, next_due)
            .await?
        {
            return Ok(SyncOutcome::Unchanged);
        }

        tracing::info!(
            user_id = %cmd.user_id,
            gateway_subscription_id = %gateway_id,
            period_end = %next_due.date_string(),
            "Adopted active status from gateway"
        );

        Ok(SyncOutcome::Adopted { period_end: next_due })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::asaas::MockPaymentGateway;
    use crate::adapters::memory::InMemoryStore;
    use crate::domain::billing::{Plan, Subscription, SubscriptionStatus};
    use crate::ports::GatewayError;

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    fn setup() -> (InMemoryStore, MockPaymentGateway, SyncSubscriptionHandler) {
        let store = InMemoryStore::new();
        let gateway = MockPaymentGateway::new();
        let handler = SyncSubscriptionHandler::new(Arc::new(store.clone()), Arc::new(gateway.clone()));
        (store, gateway, handler)
    }

    fn sync(user: &str) -> SyncSubscriptionCommand {
        SyncSubscriptionCommand { user_id: uid(user) }
    }

    #[tokio::test]
    async fn adopts_active_with_next_due_date() {
        let (store, gateway, handler) = setup();
        store
            .save(&Subscription::pending(uid("u1"), "sub_1", Plan::Vip))
            .await
            .unwrap();
        let due = Timestamp::now().add_days(25);
        gateway.set_subscription("sub_1", GatewaySubscriptionStatus::Active, Some(due));

        let outcome = handler.handle(sync("u1")).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Adopted { period_end: due });
        let sub = store.find_by_user_id(&uid("u1")).await.unwrap().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.current_period_end, Some(due));
        assert_eq!(sub.last_event_at, None);
    }

    #[tokio::test]
    async fn already_active_is_unchanged() {
        let (store, gateway, handler) = setup();
        let mut sub = Subscription::pending(uid("u1"), "sub_1", Plan::Vip);
        let end = Timestamp::now().add_days(3);
        sub.status = SubscriptionStatus::Active;
        sub.current_period_end = Some(end);
        store.save(&sub).await.unwrap();
        gateway.set_subscription("sub_1", GatewaySubscriptionStatus::Active, Some(end.add_days(30)));

        assert_eq!(handler.handle(sync("u1")).await.unwrap(), SyncOutcome::Unchanged);
        let sub = store.find_by_user_id(&uid("u1")).await.unwrap().unwrap();
        assert_eq!(sub.current_period_end, Some(end));
    }

    #[tokio::test]
    async fn inactive_gateway_status_is_ignored() {
        let (store, gateway, handler) = setup();
        store
            .save(&Subscription::pending(uid("u1"), "sub_1", Plan::Vip))
            .await
            .unwrap();
        gateway.set_subscription("sub_1", GatewaySubscriptionStatus::Inactive, None);

        assert_eq!(handler.handle(sync("u1")).await.unwrap(), SyncOutcome::Unchanged);
    }

    #[tokio::test]
    async fn missing_local_row_skips_gateway() {
        let (_store, gateway, handler) = setup();
        assert_eq!(handler.handle(sync("u1")).await.unwrap(), SyncOutcome::NoSubscription);
        assert!(!gateway.was_called("get_subscription"));
    }

    #[tokio::test]
    async fn gateway_failure_is_upstream() {
        let (store, gateway, handler) = setup();
        store
            .save(&Subscription::pending(uid("u1"), "sub_1", Plan::Vip))
            .await
            .unwrap();
        gateway.set_error(GatewayError::timeout("slow"));

        let err = handler.handle(sync("u1")).await.unwrap_err();
        assert!(matches!(err, BillingError::Upstream { retryable: false, .. }));
    }
}
