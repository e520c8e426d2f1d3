//! PostgreSQL adapters - Database implementations for the store ports.
//!
//! - `PostgresSubscriptionRepository` - subscription rows keyed by user
//! - `PostgresProfileRepository` - profiles and write-once fields
//! - `PostgresRewardLedger` - transactional referral payouts

mod profile_repository;
mod reward_ledger;
mod subscription_repository;

pub use profile_repository::PostgresProfileRepository;
pub use reward_ledger::PostgresRewardLedger;
pub use subscription_repository::PostgresSubscriptionRepository;
