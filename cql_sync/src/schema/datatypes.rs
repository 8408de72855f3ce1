//! CQL data types
//!
//! This module provides the known CQL type keywords, the per-type value
//! validators, and the whitelist of in-place type changes the cluster
//! accepts without rewriting data.

use chrono::{DateTime, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use uuid::Uuid;

use crate::value::Value;

/// A CQL column type keyword
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CqlType {
    Ascii,
    Bigint,
    Blob,
    Boolean,
    Counter,
    Date,
    Decimal,
    Double,
    Duration,
    Float,
    Frozen,
    Inet,
    Int,
    List,
    Map,
    Set,
    Smallint,
    Text,
    Time,
    Timestamp,
    Timeuuid,
    Tinyint,
    Tuple,
    Uuid,
    Varchar,
    Varint,
    /// Anything that is not a known keyword, e.g. a user defined type name
    Other(String),
}

impl CqlType {
    /// Look up a known keyword
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let found = match keyword {
            "ascii" => CqlType::Ascii,
            "bigint" => CqlType::Bigint,
            "blob" => CqlType::Blob,
            "boolean" => CqlType::Boolean,
            "counter" => CqlType::Counter,
            "date" => CqlType::Date,
            "decimal" => CqlType::Decimal,
            "double" => CqlType::Double,
            "duration" => CqlType::Duration,
            "float" => CqlType::Float,
            "frozen" => CqlType::Frozen,
            "inet" => CqlType::Inet,
            "int" => CqlType::Int,
            "list" => CqlType::List,
            "map" => CqlType::Map,
            "set" => CqlType::Set,
            "smallint" => CqlType::Smallint,
            "text" => CqlType::Text,
            "time" => CqlType::Time,
            "timestamp" => CqlType::Timestamp,
            "timeuuid" => CqlType::Timeuuid,
            "tinyint" => CqlType::Tinyint,
            "tuple" => CqlType::Tuple,
            "uuid" => CqlType::Uuid,
            "varchar" => CqlType::Varchar,
            "varint" => CqlType::Varint,
            _ => return None,
        };
        Some(found)
    }

    pub fn as_str(&self) -> &str {
        match self {
            CqlType::Ascii => "ascii",
            CqlType::Bigint => "bigint",
            CqlType::Blob => "blob",
            CqlType::Boolean => "boolean",
            CqlType::Counter => "counter",
            CqlType::Date => "date",
            CqlType::Decimal => "decimal",
            CqlType::Double => "double",
            CqlType::Duration => "duration",
            CqlType::Float => "float",
            CqlType::Frozen => "frozen",
            CqlType::Inet => "inet",
            CqlType::Int => "int",
            CqlType::List => "list",
            CqlType::Map => "map",
            CqlType::Set => "set",
            CqlType::Smallint => "smallint",
            CqlType::Text => "text",
            CqlType::Time => "time",
            CqlType::Timestamp => "timestamp",
            CqlType::Timeuuid => "timeuuid",
            CqlType::Tinyint => "tinyint",
            CqlType::Tuple => "tuple",
            CqlType::Uuid => "uuid",
            CqlType::Varchar => "varchar",
            CqlType::Varint => "varint",
            CqlType::Other(name) => name,
        }
    }

    /// `list`, `set` or `map`
    pub fn is_collection(&self) -> bool {
        matches!(self, CqlType::List | CqlType::Set | CqlType::Map)
    }

    pub fn is_counter(&self) -> bool {
        matches!(self, CqlType::Counter)
    }

    /// Check a value against this type.
    ///
    /// Null and unset values and raw database functions are always accepted;
    /// whether a null is allowed for a particular column is decided by the
    /// statement builders. Text is accepted for types whose driver binding
    /// parses a textual form (uuids, timestamps, addresses and so on).
    pub fn validate(&self, value: &Value) -> bool {
        if value.is_null_or_unset() || matches!(value, Value::DbFunction(_)) {
            return true;
        }

        match self {
            CqlType::Ascii => matches!(value, Value::Text(s) if s.is_ascii()),
            CqlType::Text | CqlType::Varchar => matches!(value, Value::Text(_)),
            CqlType::Bigint | CqlType::Counter => match value {
                Value::Int(_) => true,
                Value::Varint(v) => i64::try_from(*v).is_ok(),
                _ => false,
            },
            CqlType::Int => fits_int(value, i32::MIN as i64, i32::MAX as i64),
            CqlType::Smallint => fits_int(value, i16::MIN as i64, i16::MAX as i64),
            CqlType::Tinyint => fits_int(value, i8::MIN as i64, i8::MAX as i64),
            CqlType::Varint => matches!(value, Value::Int(_) | Value::Varint(_)),
            CqlType::Decimal => match value {
                Value::Decimal(_) | Value::Int(_) | Value::Varint(_) | Value::Float(_) => true,
                Value::Text(s) => s.trim().parse::<f64>().is_ok(),
                _ => false,
            },
            CqlType::Double | CqlType::Float => {
                matches!(value, Value::Float(_) | Value::Int(_) | Value::Varint(_))
            }
            CqlType::Boolean => matches!(value, Value::Boolean(_)),
            CqlType::Blob => matches!(value, Value::Blob(_)),
            CqlType::Uuid => match value {
                Value::Uuid(_) | Value::TimeUuid(_) => true,
                Value::Text(s) => Uuid::parse_str(s).is_ok(),
                _ => false,
            },
            CqlType::Timeuuid => match value {
                Value::TimeUuid(_) => true,
                Value::Uuid(u) => u.get_version_num() == 1,
                Value::Text(s) => Uuid::parse_str(s).map_or(false, |u| u.get_version_num() == 1),
                _ => false,
            },
            CqlType::Timestamp => match value {
                Value::Timestamp(_) | Value::Int(_) => true,
                Value::Text(s) => DateTime::parse_from_rfc3339(s).is_ok(),
                _ => false,
            },
            CqlType::Date => match value {
                Value::Date(_) => true,
                Value::Text(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok(),
                _ => false,
            },
            CqlType::Time => match value {
                Value::Time(_) => true,
                Value::Text(s) => NaiveTime::from_str(s).is_ok(),
                _ => false,
            },
            CqlType::Inet => match value {
                Value::Inet(_) => true,
                Value::Text(s) => s.parse::<IpAddr>().is_ok(),
                _ => false,
            },
            CqlType::List | CqlType::Set | CqlType::Tuple => matches!(value, Value::List(_)),
            CqlType::Map => matches!(value, Value::Map(_)),
            CqlType::Frozen => matches!(value, Value::List(_) | Value::Map(_)),
            CqlType::Duration => matches!(value, Value::Text(_) | Value::Int(_)),
            CqlType::Other(_) => true,
        }
    }
}

fn fits_int(value: &Value, min: i64, max: i64) -> bool {
    match value.as_i64() {
        Some(i) => i >= min && i <= max,
        None => false,
    }
}

impl fmt::Display for CqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for CqlType {
    fn from(s: String) -> Self {
        CqlType::from_keyword(&s).unwrap_or(CqlType::Other(s))
    }
}

impl From<CqlType> for String {
    fn from(t: CqlType) -> Self {
        t.as_str().to_string()
    }
}

/// Types that can be altered to `blob` in place
const BLOB_COMPATIBLE: &[CqlType] = &[
    CqlType::Text,
    CqlType::Ascii,
    CqlType::Bigint,
    CqlType::Boolean,
    CqlType::Decimal,
    CqlType::Double,
    CqlType::Float,
    CqlType::Inet,
    CqlType::Int,
    CqlType::Timestamp,
    CqlType::Timeuuid,
    CqlType::Uuid,
    CqlType::Varchar,
    CqlType::Varint,
];

/// An in-place column type change known to preserve data.
///
/// Only [`SafeTypeChange::new`] constructs one, so an `ALTER ... TYPE`
/// statement can only ever carry a whitelisted conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeTypeChange {
    from: CqlType,
    to: CqlType,
}

impl SafeTypeChange {
    /// Returns `None` when the conversion is not on the whitelist
    pub fn new(from: &CqlType, to: &CqlType) -> Option<Self> {
        let allowed = match (from, to) {
            (from, CqlType::Blob) => BLOB_COMPATIBLE.contains(from),
            (CqlType::Int, CqlType::Varint) => true,
            (CqlType::Timeuuid, CqlType::Uuid) => true,
            _ => false,
        };

        allowed.then(|| Self {
            from: from.clone(),
            to: to.clone(),
        })
    }

    pub fn from_type(&self) -> &CqlType {
        &self.from
    }

    pub fn to_type(&self) -> &CqlType {
        &self.to
    }
}
