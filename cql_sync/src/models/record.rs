//! Typed records
//!
//! A [`Record`] is a row of one table as a Rust value. Computed fields that
//! are not stored come from [`Record::virtual_values`].

use indexmap::IndexMap;

use crate::value::Value;

/// A row type bound to a table
pub trait Record {
    /// Table the record is stored in
    fn table_name() -> &'static str;

    /// Stored column values, keyed by column name
    fn to_values(&self) -> IndexMap<String, Value>;

    /// Computed values that are never written
    fn virtual_values(&self) -> IndexMap<String, Value> {
        IndexMap::new()
    }
}
