//! Shared types and traits for the Lucid journal metrics engine.
//!
//! Everything downstream crates agree on lives here: the parsed entry
//! model, metric definitions and values, aggregate statistics, structured
//! warnings, and the `Vault` storage abstraction.

pub mod traits;
pub mod types;

pub use traits::Vault;
pub use types::{
    DreamEntry, EntryDate, MetricDefinition, MetricKind, MetricStats, MetricValue, ParseWarning,
    Summary, WarningKind, format_number,
};
