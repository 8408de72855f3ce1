//! Database connection handling
//!
//! This module defines the driver seam the library talks to. A driver runs
//! definition (DDL) statements and parameterized queries against a
//! Cassandra-compatible cluster and hands catalog rows back as [`Row`]s.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::Arc;
use thiserror::Error;

use crate::value::Value;

/// Error reported by a database driver
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct DriverError {
    pub message: String,
    pub code: Option<i32>,
}

impl DriverError {
    /// Create a driver error with only a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Attach a server error code
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }
}

/// A single result row, keyed by column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: IndexMap<String, Value>,
}

impl Row {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column setter
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.columns.insert(column.to_string(), value.into());
        self
    }

    /// Get a raw column value
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    /// Get a text column
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    /// Get an integer column
    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(Value::as_i64)
    }

    /// Get a `map<text, text>` column as owned strings
    pub fn get_text_map(&self, column: &str) -> IndexMap<String, String> {
        match self.get(column) {
            Some(Value::Map(map)) => map
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect(),
            _ => IndexMap::new(),
        }
    }

    /// Get a `list<text>` column as owned strings
    pub fn get_text_list(&self, column: &str) -> Vec<String> {
        match self.get(column) {
            Some(Value::List(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

/// Driver used to talk to the cluster
#[async_trait]
pub trait Driver: Send + Sync {
    /// Execute a schema definition statement
    async fn execute_definition_query(&self, query: &str) -> std::result::Result<(), DriverError>;

    /// Execute a parameterized query and collect its rows
    async fn execute_query(
        &self,
        query: &str,
        params: &[Value],
    ) -> std::result::Result<Vec<Row>, DriverError>;
}

/// Shared handle to a driver
pub type DatabaseConnection = Arc<dyn Driver>;
