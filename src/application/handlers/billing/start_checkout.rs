//! StartCheckoutHandler - Opens a new billing cycle for the current user.

use std::sync::Arc;

use crate::application::handlers::profiles::ensure_profile;
use crate::domain::billing::{BillingError, Plan, PlanCatalog, Subscription};
use crate::domain::foundation::{AuthenticatedUser, Timestamp};
use crate::domain::referral::Profile;
use crate::ports::{
    CreateCustomerRequest, CreateSubscriptionRequest, PaymentGateway, ProfileRepository,
    SubscriptionRepository,
};

/// Command to start checkout for a plan.
#[derive(Debug, Clone)]
pub struct StartCheckoutCommand {
    pub user: AuthenticatedUser,
    pub plan: String,

    /// Passed through to the gateway untouched.
    pub billing_type: String,
}

#[derive(Debug, Clone)]
pub struct StartCheckoutResult {
    pub plan: Plan,
    pub gateway_subscription_id: String,
    pub payment_url: Option<String>,
    pub subscription: Subscription,
}

/// Handler for checkout initiation.
///
/// Local state is written only after the gateway accepted the subscription.
/// An existing row is reset to `pending` with no paid-through date.
pub struct StartCheckoutHandler {
    profiles: Arc<dyn ProfileRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    gateway: Arc<dyn PaymentGateway>,
    catalog: Arc<PlanCatalog>,
}

impl StartCheckoutHandler {
    pub fn new(
        profiles: Arc<dyn ProfileRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        gateway: Arc<dyn PaymentGateway>,
        catalog: Arc<PlanCatalog>,
    ) -> Self {
        Self {
            profiles,
            subscriptions,
            gateway,
            catalog,
        }
    }

    pub async fn handle(&self, cmd: StartCheckoutCommand) -> Result<StartCheckoutResult, BillingError> {
        // 1. Validate input before touching anything
        let (plan, price) = self.catalog.resolve(&cmd.plan)?;
        let billing_type = cmd.billing_type.trim();
        if billing_type.is_empty() {
            return Err(BillingError::validation("billingType", "Billing type is required"));
        }

        // 2. Gateway customer, created at most once per user
        let profile = ensure_profile(self.profiles.as_ref(), &cmd.user).await?;
        let customer_id = self.ensure_customer(&cmd.user, &profile).await?;

        // 3. Gateway subscription
        let created = self
            .gateway
            .create_subscription(CreateSubscriptionRequest {
                customer_id: customer_id.clone(),
                plan,
                value_cents: price.value_cents,
                description: price.description.clone(),
                billing_type: billing_type.to_string(),
                next_due_date: Timestamp::now(),
            })
            .await?;

        // 4. Local upsert
        let subscription = match self.subscriptions.find_by_user_id(&cmd.user.id).await? {
            Some(mut existing) => {
                existing.restart_checkout(created.id.clone(), plan)?;
                existing
            }
            None => Subscription::pending(cmd.user.id.clone(), created.id.clone(), plan),
        };

        if let Err(e) = self.subscriptions.save(&subscription).await {
            tracing::error!(
                user_id = %cmd.user.id,
                gateway_subscription_id = %created.id,
                error = %e,
                "Gateway subscription created but local save failed"
            );
            return Err(e.into());
        }

        tracing::info!(
            user_id = %cmd.user.id,
            customer_id = %customer_id,
            gateway_subscription_id = %created.id,
            plan = plan.as_str(),
            "Checkout started"
        );

        Ok(StartCheckoutResult {
            plan,
            gateway_subscription_id: created.id,
            payment_url: created.payment_url,
            subscription,
        })
    }

    async fn ensure_customer(&self, user: &AuthenticatedUser, profile: &Profile) -> Result<String, BillingError> {
        if let Some(id) = &profile.gateway_customer_id {
            return Ok(id.clone());
        }

        let customer = self
            .gateway
            .create_customer(CreateCustomerRequest {
                user_id: user.id.clone(),
                name: profile
                    .display_name
                    .clone()
                    .unwrap_or_else(|| user.customer_name().to_string()),
                email: profile.email.clone().or_else(|| user.email.clone()),
                tax_id: profile.tax_id.as_ref().map(|t| t.as_str().to_string()),
            })
            .await?;

        // A concurrent checkout may have stored its own id first; keep that one.
        let stored = self
            .profiles
            .set_gateway_customer_id_if_unset(&user.id, &customer.id)
            .await?;
        if stored != customer.id {
            tracing::warn!(
                user_id = %user.id,
                orphan_customer_id = %customer.id,
                customer_id = %stored,
                "Concurrent customer creation, keeping the first id"
            );
        }
        Ok(stored)
    }
}
