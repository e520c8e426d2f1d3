//! In-memory store adapters.
//!
//! Backs tests and local runs without PostgreSQL. One lock guards all three
//! tables, so every port call is its own transaction.

mod store;

pub use store::InMemoryStore;
