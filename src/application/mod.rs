//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Command handlers mutate state. Query handlers only read, except the
//! invoice query, which runs a pull sync first.

pub mod handlers;

pub use handlers::billing::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, ListInvoicesHandler, ListInvoicesQuery,
    ReconcilePaymentEventCommand, ReconcilePaymentEventHandler, StartCheckoutCommand,
    StartCheckoutHandler, SyncSubscriptionHandler, UpdateTaxIdCommand, UpdateTaxIdHandler,
};
pub use handlers::referral::{
    ApplyReferralCodeCommand, ApplyReferralCodeHandler, GetReferralSummaryHandler,
    GetReferralSummaryQuery, GrantReferralRewardCommand, GrantReferralRewardHandler,
};
