//! Billing Reconciler - subscription billing and referral rewards
//!
//! Keeps local subscription rows in step with the payment gateway (webhook
//! push and opportunistic pull), runs checkout, and grants each referral
//! reward exactly once.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
