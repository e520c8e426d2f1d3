//! In-memory implementation of the subscription, profile, and ledger ports.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::billing::{EventOutcome, GatewayEvent, Subscription};
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::domain::referral::{Profile, ReferralCode, ReferralReward, TaxId};
use crate::ports::{
    AppliedEvent, ProfileRepository, RewardApplication, RewardLedger, SubscriptionRepository,
};

#[derive(Default)]
struct Tables {
    subscriptions: HashMap<UserId, Subscription>,
    profiles: HashMap<UserId, Profile>,
    rewards: Vec<ReferralReward>,
    reward_pairs: HashSet<(UserId, UserId)>,
    fail_writes: bool,
}

impl Tables {
    fn check_writable(&self) -> Result<(), DomainError> {
        if self.fail_writes {
            return Err(DomainError::database("store unavailable"));
        }
        Ok(())
    }

    fn bound_to(&self, gateway_subscription_id: &str) -> Option<&Subscription> {
        self.subscriptions
            .values()
            .find(|s| s.gateway_subscription_id.as_deref() == Some(gateway_subscription_id))
    }
}

/// Shared in-memory store. Cheap to clone; clones see the same data.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with `DatabaseError`.
    pub async fn set_fail_writes(&self, fail: bool) {
        self.tables.lock().await.fail_writes = fail;
    }

    pub async fn reward_count(&self) -> usize {
        self.tables.lock().await.rewards.len()
    }

    pub async fn rewards(&self) -> Vec<ReferralReward> {
        self.tables.lock().await.rewards.clone()
    }
}

#[async_trait]
impl SubscriptionRepository for InMemoryStore {
    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Subscription>, DomainError> {
        Ok(self.tables.lock().await.subscriptions.get(user_id).cloned())
    }

    async fn find_by_gateway_subscription_id(
        &self,
        gateway_subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self.tables.lock().await.bound_to(gateway_subscription_id).cloned())
    }

    async fn save(&self, subscription: &Subscription) -> Result<(), DomainError> {
        let mut tables = self.tables.lock().await;
        tables.check_writable()?;

        if let Some(gateway_id) = subscription.gateway_subscription_id.as_deref() {
            let taken = tables.subscriptions.values().any(|s| {
                s.user_id != subscription.user_id
                    && s.gateway_subscription_id.as_deref() == Some(gateway_id)
            });
            if taken {
                return Err(DomainError::new(
                    ErrorCode::ConstraintViolation,
                    "Gateway subscription id already bound to another user",
                ));
            }
        }

        tables
            .subscriptions
            .insert(subscription.user_id.clone(), subscription.clone());
        Ok(())
    }

    async fn apply_payment_event(&self, event: &GatewayEvent) -> Result<Option<AppliedEvent>, DomainError> {
        let mut tables = self.tables.lock().await;
        let Some(existing) = tables.bound_to(&event.gateway_subscription_id) else {
            return Ok(None);
        };

        let mut subscription = existing.clone();
        let outcome = subscription.apply_payment_event(event)?;
        if !matches!(outcome, EventOutcome::Stale { .. }) {
            tables.check_writable()?;
            tables
                .subscriptions
                .insert(subscription.user_id.clone(), subscription.clone());
        }

        Ok(Some(AppliedEvent { subscription, outcome }))
    }

    async fn adopt_gateway_active(
        &self,
        gateway_subscription_id: &str,
        next_due_date: Timestamp,
    ) -> Result<bool, DomainError> {
        let mut tables = self.tables.lock().await;
        let Some(existing) = tables.bound_to(gateway_subscription_id) else {
            return Ok(false);
        };

        let mut subscription = existing.clone();
        if !subscription.adopt_gateway_active(next_due_date)? {
            return Ok(false);
        }
        tables.check_writable()?;
        tables
            .subscriptions
            .insert(subscription.user_id.clone(), subscription);
        Ok(true)
    }

    async fn mark_canceled(&self, user_id: &UserId) -> Result<Option<Subscription>, DomainError> {
        let mut tables = self.tables.lock().await;
        let Some(existing) = tables.subscriptions.get(user_id) else {
            return Ok(None);
        };

        let mut subscription = existing.clone();
        subscription.cancel()?;
        tables.check_writable()?;
        tables
            .subscriptions
            .insert(subscription.user_id.clone(), subscription.clone());
        Ok(Some(subscription))
    }
}

#[async_trait]
impl ProfileRepository for InMemoryStore {
    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Profile>, DomainError> {
        Ok(self.tables.lock().await.profiles.get(user_id).cloned())
    }

    async fn find_by_referral_code(&self, code: &ReferralCode) -> Result<Option<Profile>, DomainError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .profiles
            .values()
            .find(|p| &p.referral_code == code)
            .cloned())
    }

    async fn insert_if_absent(&self, profile: &Profile) -> Result<Profile, DomainError> {
        let mut tables = self.tables.lock().await;
        if let Some(existing) = tables.profiles.get(&profile.user_id) {
            return Ok(existing.clone());
        }
        tables.check_writable()?;
        if tables
            .profiles
            .values()
            .any(|p| p.referral_code == profile.referral_code)
        {
            return Err(DomainError::new(
                ErrorCode::ConstraintViolation,
                "Referral code already in use",
            ));
        }
        tables.profiles.insert(profile.user_id.clone(), profile.clone());
        Ok(profile.clone())
    }

    async fn set_referred_by_if_unset(
        &self,
        user_id: &UserId,
        code: &ReferralCode,
    ) -> Result<bool, DomainError> {
        let mut tables = self.tables.lock().await;
        tables.check_writable()?;
        let profile = tables.profiles.get_mut(user_id).ok_or_else(|| {
            DomainError::new(ErrorCode::ProfileNotFound, format!("No profile for {}", user_id))
        })?;
        if profile.referred_by.is_some() {
            return Ok(false);
        }
        profile.referred_by = Some(code.clone());
        Ok(true)
    }

    async fn set_gateway_customer_id_if_unset(
        &self,
        user_id: &UserId,
        customer_id: &str,
    ) -> Result<String, DomainError> {
        let mut tables = self.tables.lock().await;
        tables.check_writable()?;
        let profile = tables.profiles.get_mut(user_id).ok_or_else(|| {
            DomainError::new(ErrorCode::ProfileNotFound, format!("No profile for {}", user_id))
        })?;
        Ok(profile
            .gateway_customer_id
            .get_or_insert_with(|| customer_id.to_string())
            .clone())
    }

    async fn update_tax_id(&self, user_id: &UserId, tax_id: &TaxId) -> Result<(), DomainError> {
        let mut tables = self.tables.lock().await;
        tables.check_writable()?;
        let profile = tables.profiles.get_mut(user_id).ok_or_else(|| {
            DomainError::new(ErrorCode::ProfileNotFound, format!("No profile for {}", user_id))
        })?;
        profile.tax_id = Some(tax_id.clone());
        Ok(())
    }
}

#[async_trait]
impl RewardLedger for InMemoryStore {
    async fn has_reward(
        &self,
        referrer_id: &UserId,
        referred_user_id: &UserId,
    ) -> Result<bool, DomainError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .reward_pairs
            .contains(&(referrer_id.clone(), referred_user_id.clone())))
    }

    async fn apply_reward(&self, reward: &ReferralReward) -> Result<RewardApplication, DomainError> {
        let mut tables = self.tables.lock().await;
        tables.check_writable()?;

        let pair = (reward.referrer_id.clone(), reward.referred_user_id.clone());
        if tables.reward_pairs.contains(&pair) {
            return Ok(RewardApplication::AlreadyGranted);
        }

        // Compute on a copy so a failure leaves both tables untouched.
        let now = reward.granted_at;
        let (updated, new_period_end) = match tables.subscriptions.get(&reward.referrer_id) {
            Some(existing) => {
                let mut sub = existing.clone();
                let end = sub.extend_for_reward(now, reward.reward_days)?;
                (sub, end)
            }
            None => (
                Subscription::rewarded(reward.referrer_id.clone(), now, reward.reward_days),
                now.add_days(reward.reward_days),
            ),
        };

        tables.reward_pairs.insert(pair);
        tables.rewards.push(reward.clone());
        tables
            .subscriptions
            .insert(reward.referrer_id.clone(), updated);

        Ok(RewardApplication::Granted { new_period_end })
    }

    async fn list_for_referrer(&self, referrer_id: &UserId) -> Result<Vec<ReferralReward>, DomainError> {
        let tables = self.tables.lock().await;
        let mut rewards: Vec<ReferralReward> = tables
            .rewards
            .iter()
            .filter(|r| &r.referrer_id == referrer_id)
            .cloned()
            .collect();
        rewards.sort_by(|a, b| b.granted_at.cmp(&a.granted_at));
        Ok(rewards)
    }
}
