//! ListInvoicesHandler - Open invoices plus the local subscription status.
//!
//! Runs the pull sync first so a missed webhook is caught up before the
//! status is read. A failing sync is logged and does not fail the query.

use std::sync::Arc;

use crate::domain::billing::{BillingError, Subscription};
use crate::domain::foundation::{Timestamp, UserId};
use crate::ports::{GatewayPayment, PaymentGateway, PaymentStatus, ProfileRepository, SubscriptionRepository};

use super::{SyncSubscriptionCommand, SyncSubscriptionHandler};

/// Statuses reported as open invoices.
const OPEN_STATUSES: [PaymentStatus; 2] = [PaymentStatus::Pending, PaymentStatus::Overdue];

#[derive(Debug, Clone)]
pub struct ListInvoicesQuery {
    pub user_id: UserId,
}

#[derive(Debug, Clone)]
pub struct SubscriptionSnapshot {
    pub subscription: Subscription,
    pub has_access: bool,
}

#[derive(Debug, Clone)]
pub struct ListInvoicesResult {
    pub subscription: Option<SubscriptionSnapshot>,
    pub invoices: Vec<GatewayPayment>,
}

pub struct ListInvoicesHandler {
    profiles: Arc<dyn ProfileRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    gateway: Arc<dyn PaymentGateway>,
    sync: Arc<SyncSubscriptionHandler>,
}

impl ListInvoicesHandler {
    pub fn new(
        profiles: Arc<dyn ProfileRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        gateway: Arc<dyn PaymentGateway>,
        sync: Arc<SyncSubscriptionHandler>,
    ) -> Self {
        Self {
            profiles,
            subscriptions,
            gateway,
            sync,
        }
    }

    pub async fn handle(&self, query: ListInvoicesQuery) -> Result<ListInvoicesResult, BillingError> {
        if let Err(e) = self
            .sync
            .handle(SyncSubscriptionCommand {
                user_id: query.user_id.clone(),
            })
            .await
        {
            tracing::warn!(user_id = %query.user_id, error = %e, "Pull sync failed, serving local state");
        }

        let now = Timestamp::now();
        let subscription = self
            .subscriptions
            .find_by_user_id(&query.user_id)
            .await?
            .map(|subscription| SubscriptionSnapshot {
                has_access: subscription.has_access(now),
                subscription,
            });

        let customer_id = self
            .profiles
            .find_by_user_id(&query.user_id)
            .await?
            .and_then(|p| p.gateway_customer_id);

        let invoices = match customer_id {
            Some(customer_id) => self.gateway.list_payments(&customer_id, &OPEN_STATUSES).await?,
            None => Vec::new(),
        };

        Ok(ListInvoicesResult {
            subscription,
            invoices,
        })
    }
}
