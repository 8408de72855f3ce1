//! Database module for cql_sync
//!
//! This module holds the driver seam and the executor that issues schema
//! definition statements through it.

pub mod connection;
pub mod executor;

// Re-export key types
pub use connection::{DatabaseConnection, Driver, DriverError, Row};
pub use executor::SchemaExecutor;
