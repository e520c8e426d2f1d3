//! Subscription aggregate.
//!
//! One row per user. Mutated only by gateway reconciliation, referral
//! rewards, checkout, and user cancellation.
//!
//! # Invariants
//!
//! - `status == Active` implies `current_period_end` is set
//! - user cancellation never touches `current_period_end`
//! - `last_event_at` only moves forward

use crate::domain::foundation::{DomainError, ErrorCode, StateMachine, Timestamp, UserId};
use serde::{Deserialize, Serialize};

use super::{GatewayEvent, GatewayEventKind, Plan, SubscriptionStatus};

/// Length of the period bought by one confirmed payment.
pub const PAID_PERIOD_DAYS: i64 = 30;

/// What applying a gateway payment event did to the subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Settlement applied; subscription active through `period_end`.
    Activated { period_end: Timestamp },

    /// Overdue applied; period end untouched.
    MarkedOverdue,

    /// Event is older than the last applied one and was skipped.
    Stale { last_event_at: Timestamp },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub user_id: UserId,

    /// Set once a gateway subscription exists; replaced on every checkout.
    pub gateway_subscription_id: Option<String>,

    pub plan: Plan,

    pub status: SubscriptionStatus,

    /// Paid-through date. `None` means no paid period is established.
    pub current_period_end: Option<Timestamp>,

    /// Timestamp of the last applied gateway payment event.
    pub last_event_at: Option<Timestamp>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Subscription {
    /// Fresh pending subscription for a first checkout.
    pub fn pending(user_id: UserId, gateway_subscription_id: impl Into<String>, plan: Plan) -> Self {
        let now = Timestamp::now();
        Self {
            user_id,
            gateway_subscription_id: Some(gateway_subscription_id.into()),
            plan,
            status: SubscriptionStatus::Pending,
            current_period_end: None,
            last_event_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Subscription created by a referral reward for a user who never
    /// checked out. Stays on the trial plan with a paid-through date.
    pub fn rewarded(user_id: UserId, now: Timestamp, days: i64) -> Self {
        Self {
            user_id,
            gateway_subscription_id: None,
            plan: Plan::Trial,
            status: SubscriptionStatus::Active,
            current_period_end: Some(now.add_days(days)),
            last_event_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the user currently has access.
    ///
    /// Reads the paid-through date, so overdue and canceled subscriptions
    /// keep access until it passes.
    pub fn has_access(&self, now: Timestamp) -> bool {
        self.status.within_paid_lifecycle()
            && self.current_period_end.map_or(false, |end| end.is_after(&now))
    }

    /// Points the row at a new gateway subscription for `plan`.
    ///
    /// The previous paid-through date is not honored: the user must pay on
    /// the new plan to become active again.
    pub fn restart_checkout(
        &mut self,
        gateway_subscription_id: impl Into<String>,
        plan: Plan,
    ) -> Result<(), DomainError> {
        self.transition_to(SubscriptionStatus::Pending)?;
        self.gateway_subscription_id = Some(gateway_subscription_id.into());
        self.plan = plan;
        self.current_period_end = None;
        self.last_event_at = None;
        self.touch();
        Ok(())
    }

    /// Applies a gateway payment event.
    ///
    /// Settlements overwrite the period end with `occurred_at + 30 days`, so
    /// re-delivery recomputes the same value. Overdue only flips the status.
    /// Events strictly older than `last_event_at` are skipped; equal
    /// timestamps are re-applied.
    pub fn apply_payment_event(&mut self, event: &GatewayEvent) -> Result<EventOutcome, DomainError> {
        if let Some(last) = self.last_event_at {
            if event.occurred_at.is_before(&last) {
                return Ok(EventOutcome::Stale { last_event_at: last });
            }
        }

        let outcome = match event.kind {
            GatewayEventKind::PaymentConfirmed | GatewayEventKind::PaymentReceived => {
                let period_end = event.occurred_at.add_days(PAID_PERIOD_DAYS);
                self.transition_to(SubscriptionStatus::Active)?;
                self.current_period_end = Some(period_end);
                EventOutcome::Activated { period_end }
            }
            GatewayEventKind::PaymentOverdue => {
                self.transition_to(SubscriptionStatus::Overdue)?;
                EventOutcome::MarkedOverdue
            }
        };

        self.last_event_at = Some(event.occurred_at);
        self.touch();
        Ok(outcome)
    }

    /// Catch-up adoption of a gateway-reported active subscription.
    ///
    /// Returns `false` when the row is already active and nothing changed.
    pub fn adopt_gateway_active(&mut self, next_due_date: Timestamp) -> Result<bool, DomainError> {
        if self.status == SubscriptionStatus::Active {
            return Ok(false);
        }
        self.transition_to(SubscriptionStatus::Active)?;
        self.current_period_end = Some(next_due_date);
        self.touch();
        Ok(true)
    }

    /// Extends the paid period by `days`, counting from today when the
    /// current period already ended. Always reinstates `active`.
    pub fn extend_for_reward(&mut self, now: Timestamp, days: i64) -> Result<Timestamp, DomainError> {
        let base = match self.current_period_end {
            Some(end) if end.is_after(&now) => end,
            _ => now,
        };
        let new_end = base.add_days(days);
        self.transition_to(SubscriptionStatus::Active)?;
        self.current_period_end = Some(new_end);
        self.touch();
        Ok(new_end)
    }

    /// User-initiated cancellation. Keeps the paid-through date.
    pub fn cancel(&mut self) -> Result<(), DomainError> {
        self.transition_to(SubscriptionStatus::Canceled)?;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Timestamp::now();
    }

    fn transition_to(&mut self, target: SubscriptionStatus) -> Result<(), DomainError> {
        self.status = self.status.transition_to(target).map_err(|_| {
            DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!(
                    "Cannot transition subscription from {} to {}",
                    self.status, target
                ),
            )
            .with_detail("current", self.status.as_str())
            .with_detail("attempted", target.as_str())
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn user() -> UserId {
        UserId::new("user-123").unwrap()
    }

    fn day(n: i64) -> Timestamp {
        Timestamp::parse_gateway_date("d", "2024-01-01").unwrap().add_days(n)
    }

    fn confirmed(at: Timestamp) -> GatewayEvent {
        GatewayEvent::new(GatewayEventKind::PaymentConfirmed, "pay_1", "sub_1", at)
    }

    fn overdue(at: Timestamp) -> GatewayEvent {
        GatewayEvent::new(GatewayEventKind::PaymentOverdue, "pay_2", "sub_1", at)
    }

    fn pending() -> Subscription {
        Subscription::pending(user(), "sub_1", Plan::Pro)
    }

    // ════════════════════════════════════════════════════════════════
    // Construction
    // ════════════════════════════════════════════════════════════════

    #[test]
    fn pending_has_no_period_and_no_access() {
        let sub = pending();
        assert_eq!(sub.status, SubscriptionStatus::Pending);
        assert_eq!(sub.current_period_end, None);
        assert!(!sub.has_access(Timestamp::now()));
    }

    #[test]
    fn rewarded_starts_active_on_trial_plan() {
        let now = day(0);
        let sub = Subscription::rewarded(user(), now, 30);
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.plan, Plan::Trial);
        assert_eq!(sub.current_period_end, Some(day(30)));
        assert_eq!(sub.gateway_subscription_id, None);
    }

    // ════════════════════════════════════════════════════════════════
    // Payment events
    // ════════════════════════════════════════════════════════════════

    #[test]
    fn confirmation_activates_for_thirty_days() {
        let mut sub = pending();
        let outcome = sub.apply_payment_event(&confirmed(day(0))).unwrap();

        assert_eq!(outcome, EventOutcome::Activated { period_end: day(30) });
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.current_period_end, Some(day(30)));
        assert_eq!(sub.last_event_at, Some(day(0)));
    }

    #[test]
    fn received_is_treated_like_confirmed() {
        let mut sub = pending();
        let event = GatewayEvent::new(GatewayEventKind::PaymentReceived, "pay_1", "sub_1", day(3));
        sub.apply_payment_event(&event).unwrap();
        assert_eq!(sub.current_period_end, Some(day(33)));
    }

    #[test]
    fn confirmation_overwrites_rather_than_adds() {
        let mut sub = pending();
        sub.current_period_end = Some(day(100));
        sub.apply_payment_event(&confirmed(day(0))).unwrap();
        assert_eq!(sub.current_period_end, Some(day(30)));
    }

    #[test]
    fn overdue_keeps_period_end() {
        let mut sub = pending();
        sub.apply_payment_event(&confirmed(day(0))).unwrap();
        let outcome = sub.apply_payment_event(&overdue(day(31))).unwrap();

        assert_eq!(outcome, EventOutcome::MarkedOverdue);
        assert_eq!(sub.status, SubscriptionStatus::Overdue);
        assert_eq!(sub.current_period_end, Some(day(30)));
    }

    #[test]
    fn older_overdue_after_confirmation_is_stale() {
        let mut sub = pending();
        sub.apply_payment_event(&confirmed(day(5))).unwrap();
        let outcome = sub.apply_payment_event(&overdue(day(2))).unwrap();

        assert_eq!(outcome, EventOutcome::Stale { last_event_at: day(5) });
        assert_eq!(sub.status, SubscriptionStatus::Active);
    }

    #[test]
    fn overdue_with_same_timestamp_still_applies() {
        let mut sub = pending();
        sub.apply_payment_event(&confirmed(day(5))).unwrap();
        sub.apply_payment_event(&overdue(day(5))).unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Overdue);
    }

    #[test]
    fn confirmation_reactivates_canceled() {
        let mut sub = pending();
        sub.cancel().unwrap();
        sub.apply_payment_event(&confirmed(day(1))).unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
    }

    // ════════════════════════════════════════════════════════════════
    // Pull sync
    // ════════════════════════════════════════════════════════════════

    #[test]
    fn adopt_gateway_active_sets_next_due_date() {
        let mut sub = pending();
        assert!(sub.adopt_gateway_active(day(40)).unwrap());
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.current_period_end, Some(day(40)));
        assert_eq!(sub.last_event_at, None);
    }

    #[test]
    fn adopt_gateway_active_is_noop_when_active() {
        let mut sub = pending();
        sub.apply_payment_event(&confirmed(day(0))).unwrap();
        assert!(!sub.adopt_gateway_active(day(40)).unwrap());
        assert_eq!(sub.current_period_end, Some(day(30)));
    }

    // ════════════════════════════════════════════════════════════════
    // Rewards
    // ════════════════════════════════════════════════════════════════

    #[test]
    fn reward_on_expired_period_counts_from_now() {
        let mut sub = pending();
        sub.current_period_end = Some(day(-5));
        let end = sub.extend_for_reward(day(0), 30).unwrap();
        assert_eq!(end, day(30));
    }

    #[test]
    fn reward_on_running_period_extends_it() {
        let mut sub = pending();
        sub.current_period_end = Some(day(10));
        let end = sub.extend_for_reward(day(0), 30).unwrap();
        assert_eq!(end, day(40));
    }

    #[test]
    fn reward_without_period_counts_from_now() {
        let mut sub = pending();
        assert_eq!(sub.extend_for_reward(day(0), 30).unwrap(), day(30));
    }

    #[test]
    fn reward_reinstates_active_from_any_status() {
        for status in SubscriptionStatus::ALL {
            let mut sub = pending();
            sub.status = status;
            sub.extend_for_reward(day(0), 30).unwrap();
            assert_eq!(sub.status, SubscriptionStatus::Active);
        }
    }

    // ════════════════════════════════════════════════════════════════
    // Checkout and cancellation
    // ════════════════════════════════════════════════════════════════

    #[test]
    fn restart_checkout_resets_period_and_plan() {
        let mut sub = pending();
        sub.apply_payment_event(&confirmed(day(0))).unwrap();
        sub.restart_checkout("sub_2", Plan::Vip).unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Pending);
        assert_eq!(sub.plan, Plan::Vip);
        assert_eq!(sub.current_period_end, None);
        assert_eq!(sub.gateway_subscription_id.as_deref(), Some("sub_2"));
        assert_eq!(sub.last_event_at, None);
    }

    #[test]
    fn cancel_keeps_period_end_and_access() {
        let now = Timestamp::now();
        let mut sub = pending();
        sub.apply_payment_event(&confirmed(now)).unwrap();
        sub.cancel().unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Canceled);
        assert_eq!(sub.current_period_end, Some(now.add_days(30)));
        assert!(sub.has_access(now));
    }

    #[test]
    fn cancel_twice_is_invalid_transition() {
        let mut sub = pending();
        sub.cancel().unwrap();
        let err = sub.cancel().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
    }

    #[test]
    fn overdue_keeps_access_until_period_end() {
        let mut sub = pending();
        sub.status = SubscriptionStatus::Overdue;
        sub.current_period_end = Some(day(10));
        assert!(sub.has_access(day(9)));
        assert!(!sub.has_access(day(11)));
    }

    // ════════════════════════════════════════════════════════════════
    // Properties
    // ════════════════════════════════════════════════════════════════

    proptest! {
        #[test]
        fn non_decreasing_confirmations_end_at_last_plus_thirty(
            mut offsets in proptest::collection::vec(0i64..365, 1..20)
        ) {
            offsets.sort_unstable();
            let mut sub = pending();
            for offset in &offsets {
                sub.apply_payment_event(&confirmed(day(*offset))).unwrap();
            }
            let last = *offsets.last().unwrap();
            prop_assert_eq!(sub.status, SubscriptionStatus::Active);
            prop_assert_eq!(sub.current_period_end, Some(day(last + 30)));
        }

        #[test]
        fn redelivery_matches_single_delivery(offset in 0i64..365, copies in 2usize..6) {
            let mut once = pending();
            once.apply_payment_event(&confirmed(day(offset))).unwrap();

            let mut many = pending();
            for _ in 0..copies {
                many.apply_payment_event(&confirmed(day(offset))).unwrap();
            }

            prop_assert_eq!(once.status, many.status);
            prop_assert_eq!(once.current_period_end, many.current_period_end);
            prop_assert_eq!(once.last_event_at, many.last_event_at);
        }

        #[test]
        fn overdue_never_changes_period_end(start in -100i64..100, at in -100i64..200) {
            let mut sub = pending();
            sub.current_period_end = Some(day(start));
            sub.apply_payment_event(&overdue(day(at))).unwrap();
            prop_assert_eq!(sub.current_period_end, Some(day(start)));
        }

        #[test]
        fn reward_end_is_max_of_end_and_now_plus_thirty(end in -100i64..100) {
            let now = day(0);
            let mut sub = pending();
            sub.current_period_end = Some(day(end));
            let new_end = sub.extend_for_reward(now, 30).unwrap();
            prop_assert_eq!(new_end, day(end.max(0) + 30));
        }
    }
}
