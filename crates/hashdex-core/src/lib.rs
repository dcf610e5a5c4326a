//! Core types for hashdex.
//!
//! This crate provides the data structures shared by the scanning pipeline
//! and the command-line front end: scan configuration, skip rules, digest
//! algorithms, work items, output records and error types.

mod config;
mod digest;
mod error;
mod inventory;
mod record;
mod rules;

pub use config::{ScanConfig, ScanConfigBuilder, SpecialEntryPolicy, default_workers};
pub use digest::HashAlgorithm;
pub use error::{ErrorPhase, ProcessingError, ScanError};
pub use inventory::{Inventory, InventoryStats};
pub use record::{Candidate, FileRecord, format_timestamp};
pub use rules::SkipRules;
