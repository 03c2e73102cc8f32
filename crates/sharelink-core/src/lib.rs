//! # sharelink-core
//!
//! Error type, result alias and configuration shared by the share-link
//! provisioning crates.
//!
//! This crate has **no** internal dependencies on other workspace crates.

pub mod config;
pub mod error;
pub mod result;

pub use error::AppError;
pub use result::AppResult;
