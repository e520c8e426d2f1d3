//! ReconcilePaymentEventHandler - Applies a gateway payment event.
//!
//! Webhook deliveries are unordered and at-least-once. Settlements overwrite
//! the period end from the payment date, so redelivery converges; events
//! older than the last applied one are skipped. An event for a gateway
//! subscription this service does not know is acknowledged and dropped.

use std::sync::Arc;

use crate::application::handlers::referral::{GrantReferralRewardCommand, GrantReferralRewardHandler};
use crate::domain::billing::{BillingError, EventOutcome, GatewayEvent};
use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::referral::RewardOutcome;
use crate::ports::SubscriptionRepository;

#[derive(Debug, Clone)]
pub struct ReconcilePaymentEventCommand {
    pub event: GatewayEvent,
}

/// What reconciliation did with the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No local subscription carries this gateway id.
    UnknownSubscription,

    /// Older than the last applied event; nothing changed.
    Stale { user_id: UserId },

    Activated {
        user_id: UserId,
        period_end: Timestamp,
        reward: RewardOutcome,
    },

    MarkedOverdue { user_id: UserId },
}

/// Handler for gateway payment events.
pub struct ReconcilePaymentEventHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    rewards: Arc<GrantReferralRewardHandler>,
}

impl ReconcilePaymentEventHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        rewards: Arc<GrantReferralRewardHandler>,
    ) -> Self {
        Self { subscriptions, rewards }
    }

    pub async fn handle(&self, cmd: ReconcilePaymentEventCommand) -> Result<ReconcileOutcome, BillingError> {
        let event = cmd.event;

        // 1. Apply under the row lock
        let Some(applied) = self.subscriptions.apply_payment_event(&event).await? else {
            tracing::warn!(
                gateway_subscription_id = %event.gateway_subscription_id,
                payment_id = %event.payment_id,
                event = event.kind.as_str(),
                "Payment event for unknown subscription, acknowledging"
            );
            return Ok(ReconcileOutcome::UnknownSubscription);
        };
        let user_id = applied.subscription.user_id.clone();
        let outcome = applied.outcome;

        if let EventOutcome::Stale { last_event_at } = outcome {
            tracing::info!(
                user_id = %user_id,
                payment_id = %event.payment_id,
                event = event.kind.as_str(),
                occurred_at = %event.occurred_at.as_datetime(),
                last_event_at = %last_event_at.as_datetime(),
                "Skipping stale payment event"
            );
            return Ok(ReconcileOutcome::Stale { user_id });
        }

        match outcome {
            EventOutcome::Activated { period_end } => {
                tracing::info!(
                    user_id = %user_id,
                    payment_id = %event.payment_id,
                    period_end = %period_end.date_string(),
                    "Subscription activated by payment"
                );

                // 2. Reward the referrer. Failure propagates so the gateway
                // redelivers; both steps are idempotent.
                let reward = self
                    .rewards
                    .handle(GrantReferralRewardCommand {
                        referred_user_id: user_id.clone(),
                    })
                    .await
                    .map_err(|e| {
                        tracing::error!(user_id = %user_id, error = %e, "Referral reward failed");
                        BillingError::infrastructure(e.message())
                    })?;

                Ok(ReconcileOutcome::Activated {
                    user_id,
                    period_end,
                    reward,
                })
            }
            EventOutcome::MarkedOverdue => {
                tracing::info!(user_id = %user_id, payment_id = %event.payment_id, "Subscription overdue");
                Ok(ReconcileOutcome::MarkedOverdue { user_id })
            }
            EventOutcome::Stale { .. } => Ok(ReconcileOutcome::Stale { user_id }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::domain::billing::{GatewayEventKind, Plan, Subscription, SubscriptionStatus};
    use crate::domain::referral::{Profile, SkipReason};
    use crate::domain::foundation::DomainError;
    use crate::ports::{AppliedEvent, ProfileRepository, RewardLedger};
    use async_trait::async_trait;
    use futures::future::BoxFuture;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    fn day(d: &str) -> Timestamp {
        Timestamp::parse_gateway_date("test", d).unwrap()
    }

    fn handler(store: &InMemoryStore) -> ReconcilePaymentEventHandler {
        let rewards = GrantReferralRewardHandler::new(Arc::new(store.clone()), Arc::new(store.clone()));
        ReconcilePaymentEventHandler::new(Arc::new(store.clone()), Arc::new(rewards))
    }

    async fn seed_pending(store: &InMemoryStore, user: &str, gateway_id: &str) {
        store
            .save(&Subscription::pending(uid(user), gateway_id, Plan::Pro))
            .await
            .unwrap();
    }

    async fn subscription_of(store: &InMemoryStore, user: &str) -> Subscription {
        SubscriptionRepository::find_by_user_id(store, &uid(user))
            .await
            .unwrap()
            .unwrap()
    }

    fn event(kind: GatewayEventKind, payment: &str, sub: &str, at: &str) -> ReconcilePaymentEventCommand {
        ReconcilePaymentEventCommand {
            event: GatewayEvent::new(kind, payment, sub, day(at)),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Settlement
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn confirmation_activates_for_thirty_days() {
        let store = InMemoryStore::new();
        seed_pending(&store, "u1", "sub_1").await;

        let outcome = handler(&store)
            .handle(event(GatewayEventKind::PaymentConfirmed, "pay_1", "sub_1", "2024-02-10"))
            .await
            .unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Activated { .. }));
        let sub = subscription_of(&store, "u1").await;
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.current_period_end, Some(day("2024-03-11")));
    }

    #[tokio::test]
    async fn redelivery_is_idempotent() {
        let store = InMemoryStore::new();
        seed_pending(&store, "u1", "sub_1").await;
        let handler = handler(&store);

        let cmd = event(GatewayEventKind::PaymentReceived, "pay_1", "sub_1", "2024-02-10");
        handler.handle(cmd.clone()).await.unwrap();
        let once = subscription_of(&store, "u1").await;
        handler.handle(cmd).await.unwrap();
        let twice = subscription_of(&store, "u1").await;

        assert_eq!(once.status, twice.status);
        assert_eq!(once.current_period_end, twice.current_period_end);
        assert_eq!(once.last_event_at, twice.last_event_at);
    }

    #[tokio::test]
    async fn unknown_subscription_is_acknowledged() {
        let store = InMemoryStore::new();
        let outcome = handler(&store)
            .handle(event(GatewayEventKind::PaymentConfirmed, "pay_1", "sub_x", "2024-02-10"))
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::UnknownSubscription);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Overdue and ordering
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn overdue_keeps_period_end() {
        let store = InMemoryStore::new();
        seed_pending(&store, "u1", "sub_1").await;
        let handler = handler(&store);

        handler
            .handle(event(GatewayEventKind::PaymentConfirmed, "pay_1", "sub_1", "2024-02-10"))
            .await
            .unwrap();
        handler
            .handle(event(GatewayEventKind::PaymentOverdue, "pay_2", "sub_1", "2024-03-12"))
            .await
            .unwrap();

        let sub = subscription_of(&store, "u1").await;
        assert_eq!(sub.status, SubscriptionStatus::Overdue);
        assert_eq!(sub.current_period_end, Some(day("2024-03-11")));
    }

    #[tokio::test]
    async fn stale_overdue_after_confirmation_is_skipped() {
        let store = InMemoryStore::new();
        seed_pending(&store, "u1", "sub_1").await;
        let handler = handler(&store);

        handler
            .handle(event(GatewayEventKind::PaymentConfirmed, "pay_2", "sub_1", "2024-03-10"))
            .await
            .unwrap();
        let outcome = handler
            .handle(event(GatewayEventKind::PaymentOverdue, "pay_1", "sub_1", "2024-03-01"))
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Stale { user_id: uid("u1") });
        assert_eq!(subscription_of(&store, "u1").await.status, SubscriptionStatus::Active);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Referral coupling
    // ════════════════════════════════════════════════════════════════════════════

    async fn seed_referral(store: &InMemoryStore) -> Profile {
        let referrer = store
            .insert_if_absent(&Profile::new(uid("referrer"), None, None))
            .await
            .unwrap();
        store
            .insert_if_absent(&Profile::new(uid("u1"), None, None))
            .await
            .unwrap();
        store
            .set_referred_by_if_unset(&uid("u1"), &referrer.referral_code)
            .await
            .unwrap();
        referrer
    }

    #[tokio::test]
    async fn confirmation_rewards_referrer_once() {
        let store = InMemoryStore::new();
        seed_referral(&store).await;
        seed_pending(&store, "u1", "sub_1").await;
        let handler = handler(&store);

        let first = handler
            .handle(event(GatewayEventKind::PaymentConfirmed, "pay_1", "sub_1", "2024-02-10"))
            .await
            .unwrap();
        let second = handler
            .handle(event(GatewayEventKind::PaymentConfirmed, "pay_1", "sub_1", "2024-02-10"))
            .await
            .unwrap();

        assert!(matches!(first, ReconcileOutcome::Activated { ref reward, .. } if reward.granted()));
        assert!(matches!(
            second,
            ReconcileOutcome::Activated { ref reward, .. }
                if reward.reason() == Some(SkipReason::AlreadyGranted)
        ));
        assert_eq!(store.list_for_referrer(&uid("referrer")).await.unwrap().len(), 1);
        assert_eq!(subscription_of(&store, "referrer").await.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn overdue_never_rewards() {
        let store = InMemoryStore::new();
        seed_referral(&store).await;
        seed_pending(&store, "u1", "sub_1").await;

        handler(&store)
            .handle(event(GatewayEventKind::PaymentOverdue, "pay_1", "sub_1", "2024-02-10"))
            .await
            .unwrap();

        assert_eq!(store.reward_count().await, 0);
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_retryable() {
        let store = InMemoryStore::new();
        seed_pending(&store, "u1", "sub_1").await;
        store.set_fail_writes(true).await;

        let err = handler(&store)
            .handle(event(GatewayEventKind::PaymentConfirmed, "pay_1", "sub_1", "2024-02-10"))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(subscription_of(&store, "u1").await.status, SubscriptionStatus::Pending);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Concurrent writers
    // ════════════════════════════════════════════════════════════════════════════

    type Interleaved = Box<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

    /// Runs another writer once, right before the first read or write of the
    /// row an event targets.
    struct InterleavingRepository {
        inner: InMemoryStore,
        interleaved: Interleaved,
        fired: AtomicBool,
    }

    impl InterleavingRepository {
        fn new(inner: &InMemoryStore, interleaved: Interleaved) -> Self {
            Self {
                inner: inner.clone(),
                interleaved,
                fired: AtomicBool::new(false),
            }
        }

        async fn interleave_once(&self) {
            if !self.fired.swap(true, Ordering::SeqCst) {
                (self.interleaved)().await;
            }
        }
    }

    #[async_trait]
    impl SubscriptionRepository for InterleavingRepository {
        async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Subscription>, DomainError> {
            SubscriptionRepository::find_by_user_id(&self.inner, user_id).await
        }

        async fn find_by_gateway_subscription_id(
            &self,
            gateway_subscription_id: &str,
        ) -> Result<Option<Subscription>, DomainError> {
            let found = self.inner.find_by_gateway_subscription_id(gateway_subscription_id).await;
            self.interleave_once().await;
            found
        }

        async fn save(&self, subscription: &Subscription) -> Result<(), DomainError> {
            self.interleave_once().await;
            self.inner.save(subscription).await
        }

        async fn apply_payment_event(&self, event: &GatewayEvent) -> Result<Option<AppliedEvent>, DomainError> {
            self.interleave_once().await;
            self.inner.apply_payment_event(event).await
        }

        async fn adopt_gateway_active(
            &self,
            gateway_subscription_id: &str,
            next_due_date: Timestamp,
        ) -> Result<bool, DomainError> {
            self.inner.adopt_gateway_active(gateway_subscription_id, next_due_date).await
        }

        async fn mark_canceled(&self, user_id: &UserId) -> Result<Option<Subscription>, DomainError> {
            self.inner.mark_canceled(user_id).await
        }
    }

    fn interleaving_handler(store: &InMemoryStore, interleaved: Interleaved) -> ReconcilePaymentEventHandler {
        let rewards = GrantReferralRewardHandler::new(Arc::new(store.clone()), Arc::new(store.clone()));
        ReconcilePaymentEventHandler::new(
            Arc::new(InterleavingRepository::new(store, interleaved)),
            Arc::new(rewards),
        )
    }

    #[tokio::test]
    async fn overdue_keeps_reward_granted_while_it_was_applied() {
        let store = InMemoryStore::new();
        seed_referral(&store).await;
        seed_pending(&store, "referrer", "sub_r").await;
        let today = Timestamp::now();
        handler(&store)
            .handle(event(GatewayEventKind::PaymentConfirmed, "pay_r", "sub_r", &today.date_string()))
            .await
            .unwrap();
        let paid_until = subscription_of(&store, "referrer").await.current_period_end.unwrap();

        // The referred user's activation grants a reward to the referrer while
        // the referrer's own overdue notice is in flight.
        let rewards = Arc::new(GrantReferralRewardHandler::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
        ));
        let grant: Interleaved = Box::new(move || {
            let rewards = rewards.clone();
            Box::pin(async move {
                rewards
                    .handle(GrantReferralRewardCommand { referred_user_id: uid("u1") })
                    .await
                    .unwrap();
            })
        });
        let overdue_on = today.add_days(1).date_string();
        interleaving_handler(&store, grant)
            .handle(event(GatewayEventKind::PaymentOverdue, "pay_r2", "sub_r", &overdue_on))
            .await
            .unwrap();

        assert_eq!(store.reward_count().await, 1);
        let referrer = subscription_of(&store, "referrer").await;
        assert_eq!(referrer.status, SubscriptionStatus::Overdue);
        assert_eq!(referrer.current_period_end, Some(paid_until.add_days(30)));
    }

    #[tokio::test]
    async fn event_for_old_binding_does_not_undo_checkout_restart() {
        let store = InMemoryStore::new();
        seed_pending(&store, "u1", "sub_1").await;

        let restarted = store.clone();
        let restart: Interleaved = Box::new(move || {
            let store = restarted.clone();
            Box::pin(async move {
                let mut sub = SubscriptionRepository::find_by_user_id(&store, &uid("u1"))
                    .await
                    .unwrap()
                    .unwrap();
                sub.restart_checkout("sub_2", Plan::Vip).unwrap();
                store.save(&sub).await.unwrap();
            })
        });
        let outcome = interleaving_handler(&store, restart)
            .handle(event(GatewayEventKind::PaymentConfirmed, "pay_1", "sub_1", "2024-02-10"))
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::UnknownSubscription);
        let sub = subscription_of(&store, "u1").await;
        assert_eq!(sub.gateway_subscription_id.as_deref(), Some("sub_2"));
        assert_eq!(sub.plan, Plan::Vip);
        assert_eq!(sub.status, SubscriptionStatus::Pending);
        assert_eq!(sub.current_period_end, None);
    }

    proptest! {
        #[test]
        fn non_decreasing_confirmations_end_at_last_plus_thirty(offsets in proptest::collection::vec(0i64..20, 1..8)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = InMemoryStore::new();
                seed_pending(&store, "u1", "sub_1").await;
                let handler = handler(&store);

                let mut at = day("2024-01-01");
                for (i, offset) in offsets.iter().enumerate() {
                    at = at.add_days(*offset);
                    handler
                        .handle(ReconcilePaymentEventCommand {
                            event: GatewayEvent::new(
                                GatewayEventKind::PaymentConfirmed,
                                format!("pay_{}", i),
                                "sub_1",
                                at,
                            ),
                        })
                        .await
                        .unwrap();
                }

                let sub = subscription_of(&store, "u1").await;
                assert_eq!(sub.status, SubscriptionStatus::Active);
                assert_eq!(sub.current_period_end, Some(at.add_days(30)));
            });
        }
    }
}
