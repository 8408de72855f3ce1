//! Utilities for cql_sync
//!
//! This module provides utility functions used across the library.

pub mod logging;
pub mod naming;

// Re-export key utility functions
pub use naming::{get_table_name, is_valid_table_name, quote_identifier};
