//! UpdateTaxIdHandler - Stores the user's CPF/CNPJ.
//!
//! The local profile is authoritative. Pushing the value to the gateway
//! customer is best effort: a failure there is logged and swallowed.

use std::sync::Arc;

use crate::application::handlers::profiles::ensure_profile;
use crate::domain::billing::BillingError;
use crate::domain::foundation::AuthenticatedUser;
use crate::domain::referral::TaxId;
use crate::ports::{PaymentGateway, ProfileRepository, UpdateCustomerRequest};

#[derive(Debug, Clone)]
pub struct UpdateTaxIdCommand {
    pub user: AuthenticatedUser,
    pub tax_id: String,
}

#[derive(Debug, Clone)]
pub struct UpdateTaxIdResult {
    pub tax_id: TaxId,

    /// Whether the gateway customer now carries the value too.
    pub gateway_synced: bool,
}

pub struct UpdateTaxIdHandler {
    profiles: Arc<dyn ProfileRepository>,
    gateway: Arc<dyn PaymentGateway>,
}

impl UpdateTaxIdHandler {
    pub fn new(profiles: Arc<dyn ProfileRepository>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { profiles, gateway }
    }

    pub async fn handle(&self, cmd: UpdateTaxIdCommand) -> Result<UpdateTaxIdResult, BillingError> {
        let tax_id = TaxId::parse(&cmd.tax_id)?;
        let profile = ensure_profile(self.profiles.as_ref(), &cmd.user).await?;

        self.profiles.update_tax_id(&profile.user_id, &tax_id).await?;

        let gateway_synced = match &profile.gateway_customer_id {
            Some(customer_id) => match self
                .gateway
                .update_customer(
                    customer_id,
                    UpdateCustomerRequest {
                        tax_id: tax_id.as_str().to_string(),
                    },
                )
                .await
            {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(
                        user_id = %profile.user_id,
                        customer_id = %customer_id,
                        error = %e,
                        "Gateway tax id update failed, local value kept"
                    );
                    false
                }
            },
            None => false,
        };

        Ok(UpdateTaxIdResult { tax_id, gateway_synced })
    }
}
