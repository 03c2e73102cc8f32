//! The `share_links` schema: its definition, the applier that creates it,
//! the verifier query, and the catalog inspector.

pub mod applier;
pub mod catalog;
pub mod definition;
pub mod verifier;

pub use applier::{ProvisionReport, StepOutcome, StepReport, apply};
pub use catalog::{SchemaIssue, SchemaReport, Severity, inspect};
pub use verifier::count_rows;
