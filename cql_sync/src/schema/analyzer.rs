//! Database schema analyzer
//!
//! This module reads the live shape of a table, its indexes and its
//! materialized views back from the `system_schema` catalog and reassembles
//! them into a [`ModelSchema`], so they can be normalized and compared with
//! the declared one.

use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap};

use crate::db::connection::{DatabaseConnection, Row};
use crate::error::{Error, Result};
use crate::schema::normalizer::{extract_type_parameters, normalize_type};
use crate::schema::types::{
    ClusteringOrder, CustomIndex, FieldDef, LiveSchema, MaterializedView, ModelSchema, PrimaryKey,
};
use crate::utils::naming::strip_quotes_and_whitespace;
use crate::value::Value;

const TABLE_COLUMNS_QUERY: &str =
    "SELECT * FROM system_schema.columns WHERE table_name = ? AND keyspace_name = ?;";
const TABLE_INDEXES_QUERY: &str =
    "SELECT * FROM system_schema.indexes WHERE table_name = ? AND keyspace_name = ?;";
const VIEWS_QUERY: &str = "SELECT view_name,base_table_name,where_clause FROM system_schema.views \
     WHERE keyspace_name=? AND base_table_name=? ALLOW FILTERING;";
const VIEW_COLUMNS_QUERY: &str =
    "SELECT * FROM system_schema.columns WHERE keyspace_name=? and table_name IN ?;";
const KEYSPACE_QUERY: &str = "SELECT * FROM system_schema.keyspaces WHERE keyspace_name = ?;";
const TYPE_QUERY: &str = "SELECT * FROM system_schema.types WHERE keyspace_name = ? AND type_name = ?;";
const FUNCTION_QUERY: &str =
    "SELECT * FROM system_schema.functions WHERE keyspace_name = ? AND function_name = ?;";
const AGGREGATE_QUERY: &str =
    "SELECT * FROM system_schema.aggregates WHERE keyspace_name = ? AND aggregate_name = ?;";

/// Index options that describe the index itself rather than configure it
const RESERVED_INDEX_OPTIONS: &[&str] = &["target", "class_name"];

/// Columns of one table or view, classified by their catalog kind
#[derive(Debug, Default)]
struct ColumnLayout {
    fields: IndexMap<String, FieldDef>,
    key: PrimaryKey,
    clustering_order: IndexMap<String, ClusteringOrder>,
}

fn column_layout<'a>(rows: impl Iterator<Item = &'a Row>) -> ColumnLayout {
    let mut layout = ColumnLayout::default();
    let mut partition = BTreeMap::new();
    let mut clustering = BTreeMap::new();

    for row in rows {
        let Some(name) = row.get_str("column_name") else {
            continue;
        };
        let raw_type = row.get_str("type").unwrap_or_default();

        let mut def = FieldDef::new(normalize_type(raw_type).as_str());
        let type_def = extract_type_parameters(raw_type);
        if !type_def.is_empty() {
            def.type_def = Some(type_def);
        }

        let position = row.get_i64("position").unwrap_or_default();
        match row.get_str("kind").unwrap_or_default() {
            "partition_key" => {
                partition.insert(position, name.to_string());
            }
            "clustering" => {
                clustering.insert(position, name.to_string());
                let order = row
                    .get_str("clustering_order")
                    .and_then(|o| ClusteringOrder::try_from(o.to_string()).ok())
                    .unwrap_or_default();
                layout.clustering_order.insert(name.to_string(), order);
            }
            "static" => def.is_static = true,
            _ => {}
        }

        layout.fields.insert(name.to_string(), def);
    }

    layout.key = PrimaryKey {
        partition: partition.into_values().collect(),
        clustering: clustering.into_values().collect(),
    };
    layout
}

/// Indexes of a table as read from the catalog
#[derive(Debug, Default, PartialEq)]
pub struct IndexSchema {
    pub indexes: Vec<String>,
    pub custom_indexes: Vec<CustomIndex>,
    pub index_names: HashMap<String, String>,
}

/// A user defined function as stored in the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct LiveFunction {
    pub language: String,
    pub body: String,
    pub return_type: String,
    pub argument_names: Vec<String>,
    pub argument_types: Vec<String>,
}

/// One overload of a user defined aggregate as stored in the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct LiveAggregate {
    pub argument_types: Vec<String>,
    pub state_func: String,
    pub state_type: String,
    pub final_func: Option<String>,
    pub initcond: Option<String>,
}

/// Schema analyzer for catalog introspection
#[derive(Clone)]
pub struct SchemaAnalyzer {
    connection: DatabaseConnection,
    keyspace: String,
}

impl SchemaAnalyzer {
    /// Create a new schema analyzer for one keyspace
    pub fn new(connection: DatabaseConnection, keyspace: &str) -> Self {
        Self {
            connection,
            keyspace: keyspace.to_string(),
        }
    }

    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    async fn query(&self, query: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.connection
            .execute_query(query, params)
            .await
            .map_err(Error::SchemaQueryError)
    }

    /// Full live schema of a table, or `None` when the table does not exist
    pub async fn analyze_table(&self, table: &str) -> Result<Option<LiveSchema>> {
        let Some(mut schema) = self.table_schema(table).await? else {
            return Ok(None);
        };

        let indexes = self.index_schema(table).await?;
        schema.indexes = indexes.indexes;
        schema.custom_indexes = indexes.custom_indexes;
        schema.materialized_views = self.materialized_view_schema(table).await?;

        tracing::debug!(table = table, fields = schema.fields.len(), "Analyzed live table schema");

        Ok(Some(LiveSchema {
            schema,
            index_names: indexes.index_names,
        }))
    }

    /// Columns, key and clustering order of a table
    pub async fn table_schema(&self, table: &str) -> Result<Option<ModelSchema>> {
        let rows = self
            .query(TABLE_COLUMNS_QUERY, &[Value::from(table), Value::from(self.keyspace.as_str())])
            .await?;
        if rows.is_empty() {
            return Ok(None);
        }

        let layout = column_layout(rows.iter());
        Ok(Some(ModelSchema {
            table_name: Some(table.to_string()),
            fields: layout.fields,
            key: layout.key,
            clustering_order: layout.clustering_order,
            ..Default::default()
        }))
    }

    /// Plain and custom secondary indexes of a table
    pub async fn index_schema(&self, table: &str) -> Result<IndexSchema> {
        let rows = self
            .query(TABLE_INDEXES_QUERY, &[Value::from(table), Value::from(self.keyspace.as_str())])
            .await?;

        let mut schema = IndexSchema::default();
        for row in &rows {
            let options = row.get_text_map("options");
            let Some(target) = options.get("target") else {
                continue;
            };
            let target = strip_quotes_and_whitespace(target);
            let name = row.get_str("index_name").unwrap_or_default().to_string();

            if row.get_str("kind") == Some("CUSTOM") {
                let index = CustomIndex {
                    on: target,
                    using: options.get("class_name").cloned().unwrap_or_default(),
                    options: options
                        .iter()
                        .filter(|(k, _)| !RESERVED_INDEX_OPTIONS.contains(&k.as_str()))
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                };
                schema.index_names.insert(index.content_hash(), name);
                schema.custom_indexes.push(index);
            } else {
                schema.index_names.insert(target.clone(), name);
                schema.indexes.push(target);
            }
        }

        Ok(schema)
    }

    /// Materialized views built on a table
    pub async fn materialized_view_schema(&self, table: &str) -> Result<IndexMap<String, MaterializedView>> {
        let views = self
            .query(VIEWS_QUERY, &[Value::from(self.keyspace.as_str()), Value::from(table)])
            .await?;
        if views.is_empty() {
            return Ok(IndexMap::new());
        }

        let names: Vec<Value> = views
            .iter()
            .filter_map(|row| row.get_str("view_name").map(Value::from))
            .collect();
        let columns = self
            .query(VIEW_COLUMNS_QUERY, &[Value::from(self.keyspace.as_str()), Value::List(names)])
            .await?;

        let mut result = IndexMap::new();
        for view in &views {
            let Some(name) = view.get_str("view_name") else {
                continue;
            };
            let layout = column_layout(columns.iter().filter(|row| row.get_str("table_name") == Some(name)));

            result.insert(
                name.to_string(),
                MaterializedView {
                    select: layout.fields.keys().cloned().collect(),
                    key: layout.key,
                    clustering_order: layout.clustering_order,
                    where_clause: view.get_str("where_clause").map(str::to_string),
                    filters: None,
                },
            );
        }

        Ok(result)
    }

    /// Replication options of the keyspace, or `None` when it does not exist
    pub async fn keyspace_replication(&self) -> Result<Option<IndexMap<String, String>>> {
        let rows = self
            .query(KEYSPACE_QUERY, &[Value::from(self.keyspace.as_str())])
            .await?;
        Ok(rows.first().map(|row| row.get_text_map("replication")))
    }

    /// Field names and types of a user defined type, or `None` when it does not exist
    pub async fn user_defined_type(&self, name: &str) -> Result<Option<IndexMap<String, String>>> {
        let rows = self
            .query(TYPE_QUERY, &[Value::from(self.keyspace.as_str()), Value::from(name)])
            .await?;

        Ok(rows.first().map(|row| {
            row.get_text_list("field_names")
                .into_iter()
                .zip(row.get_text_list("field_types"))
                .collect()
        }))
    }

    /// A user defined function, or `None` when it does not exist
    pub async fn user_defined_function(&self, name: &str) -> Result<Option<LiveFunction>> {
        let rows = self
            .query(FUNCTION_QUERY, &[Value::from(self.keyspace.as_str()), Value::from(name)])
            .await?;

        Ok(rows.first().map(|row| LiveFunction {
            language: row.get_str("language").unwrap_or_default().to_string(),
            body: row.get_str("body").unwrap_or_default().to_string(),
            return_type: row.get_str("return_type").unwrap_or_default().to_string(),
            argument_names: row.get_text_list("argument_names"),
            argument_types: row.get_text_list("argument_types"),
        }))
    }

    /// Every overload of a user defined aggregate; empty when it does not exist
    pub async fn user_defined_aggregates(&self, name: &str) -> Result<Vec<LiveAggregate>> {
        let rows = self
            .query(AGGREGATE_QUERY, &[Value::from(self.keyspace.as_str()), Value::from(name)])
            .await?;

        Ok(rows
            .iter()
            .map(|row| LiveAggregate {
                argument_types: row.get_text_list("argument_types"),
                state_func: row.get_str("state_func").unwrap_or_default().to_string(),
                state_type: row.get_str("state_type").unwrap_or_default().to_string(),
                final_func: row.get_str("final_func").map(str::to_string),
                initcond: row.get_str("initcond").map(str::to_string),
            })
            .collect())
    }
}
