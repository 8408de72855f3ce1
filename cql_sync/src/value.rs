//! Dynamic values
//!
//! This module provides the [`Value`] type used for query parameters,
//! record contents, defaults, and catalog rows.

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use uuid::Uuid;

/// Key used to mark a raw database function in JSON input
pub const DB_FUNCTION_KEY: &str = "$db_function";

/// A dynamically typed CQL value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    /// Value explicitly left unset (not written)
    Unset,
    Boolean(bool),
    Int(i64),
    Varint(i128),
    Float(f64),
    Decimal(String),
    Text(String),
    Blob(Vec<u8>),
    Uuid(Uuid),
    TimeUuid(Uuid),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    Inet(IpAddr),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    /// Raw CQL function call inlined into the statement text
    DbFunction(String),
}

impl Value {
    /// True for `Null` and `Unset`
    pub fn is_null_or_unset(&self) -> bool {
        matches!(self, Value::Null | Value::Unset)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Decimal(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Varint(i) => i64::try_from(*i).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Varint(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Render the value as a CQL literal for inlining into DDL text
    pub fn to_cql_literal(&self) -> String {
        match self {
            Value::Null | Value::Unset => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Varint(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Decimal(d) => d.clone(),
            Value::Text(s) => quote_literal(s),
            Value::Blob(bytes) => {
                let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
                format!("0x{}", hex)
            }
            Value::Uuid(u) | Value::TimeUuid(u) => u.to_string(),
            Value::Timestamp(ts) => quote_literal(&ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Value::Date(d) => quote_literal(&d.to_string()),
            Value::Time(t) => quote_literal(&t.to_string()),
            Value::Inet(ip) => quote_literal(&ip.to_string()),
            Value::List(items) => {
                let items: Vec<String> = items.iter().map(Value::to_cql_literal).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Map(map) => {
                let entries: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{}: {}", quote_literal(k), v.to_cql_literal()))
                    .collect();
                format!("{{{}}}", entries.join(", "))
            }
            Value::DbFunction(f) => f.clone(),
        }
    }
}

/// Quote a string as a CQL literal, doubling embedded single quotes
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{}", s),
            other => write!(f, "{}", other.to_cql_literal()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::Varint(i128::from(u))
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => {
                if map.len() == 1 {
                    if let Some(serde_json::Value::String(function)) = map.get(DB_FUNCTION_KEY) {
                        return Value::DbFunction(function.clone());
                    }
                }
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&serde_json::Value> for Value {
    fn from(value: &serde_json::Value) -> Self {
        Value::from(value.clone())
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(i64::from(v))
            }
        })*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Varint(i128::from(v))
    }
}

impl From<i128> for Value {
    fn from(v: i128) -> Self {
        Value::Varint(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Value::Time(v)
    }
}

impl From<IpAddr> for Value {
    fn from(v: IpAddr) -> Self {
        Value::Inet(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<IndexMap<String, T>> for Value {
    fn from(v: IndexMap<String, T>) -> Self {
        Value::Map(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> From<HashMap<String, T>> for Value {
    fn from(v: HashMap<String, T>) -> Self {
        let mut entries: Vec<(String, Value)> = v.into_iter().map(|(k, v)| (k, v.into())).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Value::Map(entries.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_db_function_marker() {
        let value = Value::from(json!({ "$db_function": "toTimestamp(now())" }));
        assert_eq!(value, Value::DbFunction("toTimestamp(now())".to_string()));

        // A map that merely contains the key is still a map
        let value = Value::from(json!({ "$db_function": "now()", "other": 1 }));
        assert!(matches!(value, Value::Map(_)));
    }

    #[test]
    fn test_json_numbers() {
        assert_eq!(Value::from(json!(42)), Value::Int(42));
        assert_eq!(Value::from(json!(u64::MAX)), Value::Varint(u64::MAX as i128));
        assert_eq!(Value::from(json!(1.5)), Value::Float(1.5));
    }

    #[test]
    fn test_cql_literals() {
        assert_eq!(Value::from("it's").to_cql_literal(), "'it''s'");
        assert_eq!(Value::Null.to_cql_literal(), "null");
        assert_eq!(Value::Blob(vec![0xca, 0xfe]).to_cql_literal(), "0xcafe");
        assert_eq!(
            Value::from(vec!["a", "b"]).to_cql_literal(),
            "['a', 'b']"
        );
        let mut map = IndexMap::new();
        map.insert("k".to_string(), 1);
        assert_eq!(Value::from(map).to_cql_literal(), "{'k': 1}");
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(3i32)), Value::Int(3));
    }
}
