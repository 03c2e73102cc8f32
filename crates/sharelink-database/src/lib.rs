//! # sharelink-database
//!
//! PostgreSQL connection handling and idempotent provisioning of the
//! `share_links` table, its indexes and its row-level-security policies.

pub mod connection;
pub mod schema;

pub use connection::{ConnectionTarget, connect};
