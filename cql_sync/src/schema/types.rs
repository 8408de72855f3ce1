//! Schema type definitions
//!
//! This module defines the declared model schema, the live schema read back
//! from the catalog, and the normalized form both are compared in.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::schema::datatypes::CqlType;

/// Declared schema for one table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    pub fields: IndexMap<String, FieldDef>,
    pub key: PrimaryKey,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub clustering_order: IndexMap<String, ClusteringOrder>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_indexes: Vec<CustomIndex>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub materialized_views: IndexMap<String, MaterializedView>,
    #[serde(default)]
    pub options: SchemaOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub es_index_mapping: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_mapping: Option<serde_json::Value>,
}

impl ModelSchema {
    /// Get a non-virtual field definition
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name).filter(|f| !f.is_virtual)
    }

    /// Persisted field names in declaration order
    pub fn persisted_fields(&self) -> impl Iterator<Item = (&String, &FieldDef)> {
        self.fields.iter().filter(|(_, f)| !f.is_virtual)
    }

    /// Whether `field` is declared as required
    pub fn is_required(&self, field: &str) -> bool {
        self.fields
            .get(field)
            .and_then(|f| f.rule.as_ref())
            .map_or(false, |r| r.required)
    }
}

/// Definition of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "FieldSpecRepr")]
pub struct FieldDef {
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(rename = "typeDef", skip_serializing_if = "Option::is_none")]
    pub type_def: Option<String>,
    #[serde(rename = "static", skip_serializing_if = "std::ops::Not::not")]
    pub is_static: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<FieldRule>,
    #[serde(rename = "virtual", skip_serializing_if = "std::ops::Not::not")]
    pub is_virtual: bool,
}

impl FieldDef {
    /// Plain column of the given type
    pub fn new(field_type: &str) -> Self {
        Self {
            field_type: field_type.to_string(),
            type_def: None,
            is_static: false,
            default: None,
            rule: None,
            is_virtual: false,
        }
    }

    pub fn with_type_def(mut self, type_def: &str) -> Self {
        self.type_def = Some(type_def.to_string());
        self
    }

    pub fn with_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_rule(mut self, rule: FieldRule) -> Self {
        self.rule = Some(rule);
        self
    }

    pub fn virtual_field() -> Self {
        Self {
            is_virtual: true,
            ..Self::new("text")
        }
    }
}

/// Accepted input forms of a field definition
#[doc(hidden)]
#[derive(Deserialize)]
#[serde(untagged)]
pub enum FieldSpecRepr {
    Short(String),
    Full(FieldDefRepr),
}

#[doc(hidden)]
#[derive(Deserialize)]
pub struct FieldDefRepr {
    #[serde(rename = "type", default)]
    field_type: Option<String>,
    #[serde(rename = "typeDef", alias = "type_def", default)]
    type_def: Option<String>,
    #[serde(rename = "static", default)]
    is_static: bool,
    #[serde(default)]
    default: Option<serde_json::Value>,
    #[serde(default)]
    rule: Option<FieldRule>,
    #[serde(rename = "virtual", default)]
    is_virtual: bool,
}

impl From<FieldSpecRepr> for FieldDef {
    fn from(repr: FieldSpecRepr) -> Self {
        match repr {
            FieldSpecRepr::Short(field_type) => FieldDef::new(&field_type),
            FieldSpecRepr::Full(full) => FieldDef {
                // Virtual fields carry no column type
                field_type: full.field_type.unwrap_or_default(),
                type_def: full.type_def,
                is_static: full.is_static,
                default: full.default,
                rule: full.rule,
                is_virtual: full.is_virtual,
            },
        }
    }
}

/// Validation rule attached to a field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub ignore_default: bool,
}

/// Primary key: partition columns followed by clustering columns.
///
/// Serialized the usual way, `[["p1", "p2"], "c1"]` or `["p1", "c1"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<KeyPart>", into = "Vec<KeyPart>")]
pub struct PrimaryKey {
    pub partition: Vec<String>,
    pub clustering: Vec<String>,
}

impl PrimaryKey {
    pub fn new(partition: &[&str], clustering: &[&str]) -> Self {
        Self {
            partition: partition.iter().map(|s| s.to_string()).collect(),
            clustering: clustering.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// All key columns, partition first
    pub fn columns(&self) -> impl Iterator<Item = &String> {
        self.partition.iter().chain(self.clustering.iter())
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns().any(|c| c == column)
    }

    pub fn is_empty(&self) -> bool {
        self.partition.is_empty()
    }
}

#[doc(hidden)]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPart {
    Column(String),
    Composite(Vec<String>),
}

impl TryFrom<Vec<KeyPart>> for PrimaryKey {
    type Error = String;

    fn try_from(parts: Vec<KeyPart>) -> Result<Self, Self::Error> {
        let mut parts = parts.into_iter();
        let partition = match parts.next() {
            Some(KeyPart::Column(column)) => vec![column],
            Some(KeyPart::Composite(columns)) => columns,
            None => Vec::new(),
        };

        let clustering = parts
            .map(|part| match part {
                KeyPart::Column(column) => Ok(column),
                KeyPart::Composite(_) => {
                    Err("only the first element of a key may be a composite partition key".to_string())
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { partition, clustering })
    }
}

impl From<PrimaryKey> for Vec<KeyPart> {
    fn from(key: PrimaryKey) -> Self {
        if key.partition.is_empty() {
            return Vec::new();
        }
        let mut parts = vec![KeyPart::Composite(key.partition)];
        parts.extend(key.clustering.into_iter().map(KeyPart::Column));
        parts
    }
}

/// Clustering order direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ClusteringOrder {
    #[default]
    Asc,
    Desc,
}

impl ClusteringOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusteringOrder::Asc => "ASC",
            ClusteringOrder::Desc => "DESC",
        }
    }
}

impl fmt::Display for ClusteringOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for ClusteringOrder {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.trim().to_uppercase().as_str() {
            "ASC" => Ok(ClusteringOrder::Asc),
            "DESC" => Ok(ClusteringOrder::Desc),
            other => Err(format!("invalid clustering order: {}", other)),
        }
    }
}

impl From<ClusteringOrder> for String {
    fn from(order: ClusteringOrder) -> Self {
        order.as_str().to_string()
    }
}

/// A custom (class-backed) secondary index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomIndex {
    pub on: String,
    pub using: String,
    #[serde(default)]
    pub options: IndexMap<String, String>,
}

impl CustomIndex {
    /// Content hash identifying the index independently of its physical name
    pub fn content_hash(&self) -> String {
        let options: BTreeMap<&String, &String> = self.options.iter().collect();
        let canonical = serde_json::json!({
            "on": self.on,
            "using": self.using,
            "options": options,
        });
        format!("{:x}", md5::compute(canonical.to_string()))
    }
}

/// Declared materialized view
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterializedView {
    pub select: Vec<String>,
    pub key: PrimaryKey,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub clustering_order: IndexMap<String, ClusteringOrder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<serde_json::Value>,
}

/// Model options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<TimestampOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<VersionOptions>,
}

/// Automatic created/updated timestamp columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampOptions {
    #[serde(default = "default_created_at")]
    pub created_at: String,
    #[serde(default = "default_updated_at")]
    pub updated_at: String,
}

impl Default for TimestampOptions {
    fn default() -> Self {
        Self {
            created_at: default_created_at(),
            updated_at: default_updated_at(),
        }
    }
}

fn default_created_at() -> String {
    "createdAt".to_string()
}

fn default_updated_at() -> String {
    "updatedAt".to_string()
}

/// Automatic row version column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionOptions {
    #[serde(default = "default_version_key")]
    pub key: String,
}

impl Default for VersionOptions {
    fn default() -> Self {
        Self {
            key: default_version_key(),
        }
    }
}

fn default_version_key() -> String {
    "__v".to_string()
}

/// Schema read back from the system catalog
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveSchema {
    pub schema: ModelSchema,
    /// Normalized index target (or custom index content hash) to physical index name
    pub index_names: HashMap<String, String>,
}

/// Canonical field form used for comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedField {
    pub field_type: CqlType,
    pub type_def: String,
    pub is_static: bool,
}

impl NormalizedField {
    /// Full type text, e.g. `map<text,int>`
    pub fn full_type(&self) -> String {
        format!("{}{}", self.field_type, self.type_def)
    }
}

/// Canonical materialized view form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedView {
    pub select: Vec<String>,
    pub key: PrimaryKey,
    pub clustering_order: BTreeMap<String, ClusteringOrder>,
    pub where_clause: String,
}

impl NormalizedView {
    /// Whether dropping or retyping `field` invalidates this view
    pub fn depends_on(&self, field: &str) -> bool {
        self.select.iter().any(|c| c == field || c == "*") || self.key.contains(field)
    }
}

/// Canonical schema form; two schemas are equivalent iff their normalized forms are equal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedSchema {
    pub fields: BTreeMap<String, NormalizedField>,
    pub key: PrimaryKey,
    pub clustering_order: BTreeMap<String, ClusteringOrder>,
    pub indexes: Vec<String>,
    pub custom_indexes: Vec<CustomIndex>,
    pub materialized_views: BTreeMap<String, NormalizedView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_deserialize_model_schema() {
        let schema: ModelSchema = serde_json::from_value(json!({
            "fields": {
                "user_id": "uuid",
                "name": { "type": "text", "rule": { "required": true } },
                "tags": { "type": "set", "typeDef": "<text>" },
                "bucket": { "type": "int", "static": true },
                "display": { "virtual": true }
            },
            "key": [["user_id", "bucket"], "name"],
            "clustering_order": { "name": "desc" }
        }))
        .unwrap();

        assert_eq!(schema.key, PrimaryKey::new(&["user_id", "bucket"], &["name"]));
        assert_eq!(schema.fields["user_id"], FieldDef::new("uuid"));
        assert_eq!(schema.fields["tags"].type_def.as_deref(), Some("<text>"));
        assert!(schema.fields["bucket"].is_static);
        assert!(schema.fields["display"].is_virtual);
        assert!(schema.is_required("name"));
        assert_eq!(schema.clustering_order["name"], ClusteringOrder::Desc);
        assert_eq!(schema.persisted_fields().count(), 4);
    }

    #[test]
    fn test_single_partition_key() {
        let key: PrimaryKey = serde_json::from_value(json!(["id", "ts"])).unwrap();
        assert_eq!(key, PrimaryKey::new(&["id"], &["ts"]));

        let err = serde_json::from_value::<PrimaryKey>(json!(["id", ["a", "b"]]));
        assert!(err.is_err());
    }

    #[test]
    fn test_custom_index_hash_ignores_option_order() {
        let mut a = CustomIndex {
            on: "body".to_string(),
            using: "org.apache.cassandra.index.sasi.SASIIndex".to_string(),
            options: IndexMap::new(),
        };
        a.options.insert("mode".to_string(), "CONTAINS".to_string());
        a.options.insert("analyzed".to_string(), "true".to_string());

        let mut b = a.clone();
        b.options.clear();
        b.options.insert("analyzed".to_string(), "true".to_string());
        b.options.insert("mode".to_string(), "CONTAINS".to_string());

        assert_eq!(a.content_hash(), b.content_hash());
    }
}
