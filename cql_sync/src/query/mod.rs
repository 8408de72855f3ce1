//! Query module for cql_sync
//!
//! This module compiles structured query, update and save objects into
//! parameterized CQL.

pub mod builder;
pub mod clauses;
pub mod expression;
pub mod filter;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::value::Value;

/// A query, update or record object keyed by field name or `$` directive
pub type QueryObject = IndexMap<String, Value>;

/// Convert a JSON object into a query object
pub fn query_object(value: serde_json::Value) -> Result<QueryObject> {
    match Value::from(value) {
        Value::Map(map) => Ok(map),
        other => Err(Error::InvalidValue(format!("expected a query object, got {}", other))),
    }
}

// Re-export key types
pub use builder::{
    build_delete, build_find, build_insert, build_record_delete, build_record_insert, build_update,
    CompiledStatement, FindOptions, InsertOptions, UpdateOptions,
};
pub use expression::{compile_update_expression, compile_value_expression, DbValue};
pub use filter::{compile_filter_ddl, compile_filter_expression, FilterExpression, Operator};
