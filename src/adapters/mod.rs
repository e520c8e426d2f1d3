//! Adapters - Implementations of port interfaces.
//!
//! - `postgres` - sqlx-backed stores
//! - `memory` - in-process store for tests and local runs
//! - `asaas` - payment gateway client, webhook parsing, and a mock gateway
//! - `auth` - JWT session validation and a mock validator
//! - `http` - axum routes, DTOs, and the auth middleware

pub mod asaas;
pub mod auth;
pub mod http;
pub mod memory;
pub mod postgres;
