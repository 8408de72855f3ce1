//! Models module for cql_sync
//!
//! This module handles model registration, discovery and typed records.

pub mod record;
pub mod registry;

// Re-export key types
pub use record::Record;
pub use registry::{ModelInfo, ModelRegistry};
