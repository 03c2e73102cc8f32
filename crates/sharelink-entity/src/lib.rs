//! # sharelink-entity
//!
//! Row models for the tables the provisioning tool creates.

pub mod share_link;

pub use share_link::ShareLink;
