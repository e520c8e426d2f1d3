//! Billing handlers.
//!
//! ## Commands
//! - Reconciling gateway payment events (webhook push)
//! - Pull-based subscription sync
//! - Starting checkout
//! - Cancelling a subscription
//! - Updating the tax id
//!
//! ## Queries
//! - Open invoices and subscription status

mod cancel_subscription;
mod list_invoices;
mod reconcile_payment_event;
mod start_checkout;
mod sync_subscription;
mod update_tax_id;

// Commands
pub use cancel_subscription::{CancelSubscriptionCommand, CancelSubscriptionHandler, CancelSubscriptionResult};
pub use reconcile_payment_event::{ReconcileOutcome, ReconcilePaymentEventCommand, ReconcilePaymentEventHandler};
pub use start_checkout::{StartCheckoutCommand, StartCheckoutHandler, StartCheckoutResult};
pub use sync_subscription::{SyncOutcome, SyncSubscriptionCommand, SyncSubscriptionHandler};
pub use update_tax_id::{UpdateTaxIdCommand, UpdateTaxIdHandler, UpdateTaxIdResult};

// Queries
pub use list_invoices::{ListInvoicesHandler, ListInvoicesQuery, ListInvoicesResult, SubscriptionSnapshot};
