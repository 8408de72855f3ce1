//! Shared test doubles: an in-memory driver whose catalog follows the table
//! DDL it executes, a scripted confirmation oracle and a recording search
//! sync target.

#![allow(dead_code)]

use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use cql_sync::config::{MigrationMode, MigrationsConfig};
use cql_sync::db::executor::SchemaExecutor;
use cql_sync::schema::normalizer::normalize_schema;
use cql_sync::schema::types::{ClusteringOrder, NormalizedField, PrimaryKey};
use cql_sync::{
    ConfirmationOracle, Driver, DriverError, ModelSchema, Row, SchemaAnalyzer, SearchIndexSync, TableReconciler,
    Value,
};

pub const KEYSPACE: &str = "app";

/// Catalog rows describing one table
#[derive(Debug, Clone, Default)]
pub struct TableCatalog {
    pub columns: Vec<Row>,
    pub indexes: Vec<Row>,
    pub views: Vec<Row>,
    pub view_columns: Vec<Row>,
}

#[derive(Debug, Default)]
pub struct Catalog {
    pub tables: HashMap<String, TableCatalog>,
    pub keyspace: Option<Row>,
    pub types: HashMap<String, Row>,
    pub functions: HashMap<String, Row>,
    pub aggregates: HashMap<String, Vec<Row>>,
}

/// Driver answering catalog queries from canned rows and recording definition statements
#[derive(Default)]
pub struct MockDriver {
    pub catalog: Mutex<Catalog>,
    pub executed: Mutex<Vec<String>>,
    pub queries: Mutex<Vec<String>>,
    /// Definition statements containing this text fail
    pub fail_on: Mutex<Option<String>>,
}

impl MockDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_table(table: &str, schema: &ModelSchema) -> Arc<Self> {
        let driver = Self::new();
        driver.add_table(table, schema);
        driver
    }

    pub fn add_table(&self, table: &str, schema: &ModelSchema) {
        self.catalog
            .lock()
            .unwrap()
            .tables
            .insert(table.to_string(), catalog_for(table, schema));
    }

    pub fn set_keyspace(&self, replication: &[(&str, &str)]) {
        let replication: IndexMap<String, String> = replication
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.catalog.lock().unwrap().keyspace = Some(
            Row::new()
                .with("keyspace_name", KEYSPACE)
                .with("replication", replication),
        );
    }

    pub fn add_type(&self, name: &str, fields: &[(&str, &str)]) {
        let names: Vec<String> = fields.iter().map(|(n, _)| n.to_string()).collect();
        let types: Vec<String> = fields.iter().map(|(_, t)| t.to_string()).collect();
        self.catalog.lock().unwrap().types.insert(
            name.to_string(),
            Row::new()
                .with("type_name", name)
                .with("field_names", names)
                .with("field_types", types),
        );
    }

    pub fn add_function(&self, name: &str, language: &str, body: &str, return_type: &str, arguments: &[(&str, &str)]) {
        let names: Vec<String> = arguments.iter().map(|(n, _)| n.to_string()).collect();
        let types: Vec<String> = arguments.iter().map(|(_, t)| t.to_string()).collect();
        self.catalog.lock().unwrap().functions.insert(
            name.to_string(),
            Row::new()
                .with("function_name", name)
                .with("language", language)
                .with("body", body)
                .with("return_type", return_type)
                .with("argument_names", names)
                .with("argument_types", types),
        );
    }

    /// Add one overload of an aggregate
    pub fn add_aggregate(
        &self,
        name: &str,
        argument_types: &[&str],
        state_func: &str,
        state_type: &str,
        final_func: Option<&str>,
        initcond: Option<&str>,
    ) {
        let types: Vec<String> = argument_types.iter().map(|t| t.to_string()).collect();
        let mut row = Row::new()
            .with("aggregate_name", name)
            .with("argument_types", types)
            .with("state_func", state_func)
            .with("state_type", state_type);
        if let Some(final_func) = final_func {
            row = row.with("final_func", final_func);
        }
        if let Some(initcond) = initcond {
            row = row.with("initcond", initcond);
        }
        self.catalog
            .lock()
            .unwrap()
            .aggregates
            .entry(name.to_string())
            .or_default()
            .push(row);
    }

    pub fn fail_on(&self, text: &str) {
        *self.fail_on.lock().unwrap() = Some(text.to_string());
    }

    pub fn statements(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn statements_starting_with(&self, prefix: &str) -> Vec<String> {
        self.statements()
            .into_iter()
            .filter(|s| s.starts_with(prefix))
            .collect()
    }
}

fn param(params: &[Value], index: usize) -> String {
    params
        .get(index)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl Driver for MockDriver {
    async fn execute_definition_query(&self, query: &str) -> Result<(), DriverError> {
        self.executed.lock().unwrap().push(query.to_string());
        if let Some(text) = self.fail_on.lock().unwrap().as_deref() {
            if query.contains(text) {
                return Err(DriverError::new(format!("rejected: {}", query)));
            }
        }

        apply_definition(&mut self.catalog.lock().unwrap(), query);
        Ok(())
    }

    async fn execute_query(&self, query: &str, params: &[Value]) -> Result<Vec<Row>, DriverError> {
        self.queries.lock().unwrap().push(query.to_string());
        let catalog = self.catalog.lock().unwrap();

        let rows = if query.contains("table_name IN ?") {
            let names: Vec<String> = params
                .get(1)
                .and_then(Value::as_list)
                .unwrap_or_default()
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            catalog
                .tables
                .values()
                .flat_map(|t| t.view_columns.iter())
                .filter(|row| row.get_str("table_name").map_or(false, |n| names.iter().any(|x| x == n)))
                .cloned()
                .collect()
        } else if query.contains("system_schema.columns") {
            let table = param(params, 0);
            catalog.tables.get(&table).map(|t| t.columns.clone()).unwrap_or_default()
        } else if query.contains("system_schema.indexes") {
            let table = param(params, 0);
            catalog.tables.get(&table).map(|t| t.indexes.clone()).unwrap_or_default()
        } else if query.contains("system_schema.views") {
            let table = param(params, 1);
            catalog.tables.get(&table).map(|t| t.views.clone()).unwrap_or_default()
        } else if query.contains("system_schema.keyspaces") {
            catalog.keyspace.iter().cloned().collect()
        } else if query.contains("system_schema.types") {
            let name = param(params, 1);
            catalog.types.get(&name).cloned().into_iter().collect()
        } else if query.contains("system_schema.functions") {
            let name = param(params, 1);
            catalog.functions.get(&name).cloned().into_iter().collect()
        } else if query.contains("system_schema.aggregates") {
            let name = param(params, 1);
            catalog.aggregates.get(&name).cloned().unwrap_or_default()
        } else {
            return Err(DriverError::new(format!("unexpected query: {}", query)));
        };

        Ok(rows)
    }
}

/// Type text the way the catalog prints it
fn catalog_type(field: &NormalizedField) -> String {
    field.full_type().replace(',', ", ")
}

/// One `system_schema.columns` row; `order` is the clustering order of a clustering column
fn column_row(table: &str, name: &str, cql_type: &str, is_static: bool, key: &PrimaryKey, order: Option<String>) -> Row {
    let row = Row::new()
        .with("table_name", table)
        .with("column_name", name)
        .with("type", cql_type);

    if let Some(position) = key.partition.iter().position(|c| c == name) {
        row.with("kind", "partition_key").with("position", position as i64)
    } else if let Some(position) = key.clustering.iter().position(|c| c == name) {
        row.with("kind", "clustering")
            .with("position", position as i64)
            .with("clustering_order", order.unwrap_or_else(|| "asc".to_string()))
    } else if is_static {
        row.with("kind", "static").with("position", -1i64)
    } else {
        row.with("kind", "regular").with("position", -1i64)
    }
}

fn column_rows(
    table: &str,
    columns: &[String],
    fields: &BTreeMap<String, NormalizedField>,
    key: &PrimaryKey,
    clustering_order: &BTreeMap<String, ClusteringOrder>,
) -> Vec<Row> {
    columns
        .iter()
        .map(|name| {
            let field = &fields[name];
            let order = clustering_order.get(name).copied().unwrap_or_default();
            column_row(
                table,
                name,
                &catalog_type(field),
                field.is_static,
                key,
                Some(order.as_str().to_lowercase()),
            )
        })
        .collect()
}

fn index_row(table: &str, target: &str) -> Row {
    let column: String = target.chars().filter(|c| c.is_alphanumeric() || *c == '_').collect();
    let mut options = IndexMap::new();
    options.insert("target".to_string(), target.to_string());
    Row::new()
        .with("index_name", format!("{}_{}_idx", table, column))
        .with("kind", "COMPOSITES")
        .with("options", options)
}

fn custom_index_row(table: &str, number: usize, on: &str, using: &str, options: &IndexMap<String, String>) -> Row {
    let mut options = options.clone();
    options.insert("target".to_string(), on.to_string());
    options.insert("class_name".to_string(), using.to_string());
    Row::new()
        .with("index_name", format!("{}_custom_{}_idx", table, number))
        .with("kind", "CUSTOM")
        .with("options", options)
}

/// Catalog rows the cluster would hold after creating `schema` as `table`
pub fn catalog_for(table: &str, schema: &ModelSchema) -> TableCatalog {
    let normalized = normalize_schema(schema).unwrap();
    let names: Vec<String> = normalized.fields.keys().cloned().collect();

    let columns = column_rows(
        table,
        &names,
        &normalized.fields,
        &normalized.key,
        &normalized.clustering_order,
    );

    let mut indexes: Vec<Row> = normalized.indexes.iter().map(|t| index_row(table, t)).collect();
    for (i, index) in normalized.custom_indexes.iter().enumerate() {
        indexes.push(custom_index_row(table, i, &index.on, &index.using, &index.options));
    }

    let mut views = Vec::new();
    let mut view_columns = Vec::new();
    for (name, view) in &normalized.materialized_views {
        views.push(
            Row::new()
                .with("view_name", name.as_str())
                .with("base_table_name", table)
                .with("where_clause", view.where_clause.as_str()),
        );
        view_columns.extend(column_rows(
            name,
            &view.select,
            &normalized.fields,
            &view.key,
            &view.clustering_order,
        ));
    }

    TableCatalog {
        columns,
        indexes,
        views,
        view_columns,
    }
}

/// Name inside the first pair of double quotes, and the text after it
fn quoted(text: &str) -> Option<(&str, &str)> {
    let start = text.find('"')? + 1;
    let len = text[start..].find('"')?;
    Some((&text[start..start + len], &text[start + len + 1..]))
}

fn name_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|name| name.trim().trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Parse the text following `PRIMARY KEY(`
fn parse_key(text: &str) -> Option<(PrimaryKey, &str)> {
    let text = text.strip_prefix('(')?;
    let close = text.find(')')?;
    let partition = name_list(&text[..close]);
    let text = &text[close + 1..];
    let close = text.find(')')?;
    let clustering = name_list(&text[..close]);
    Some((PrimaryKey { partition, clustering }, &text[close + 1..]))
}

fn parse_clustering_order(text: &str) -> HashMap<String, String> {
    const MARKER: &str = "CLUSTERING ORDER BY (";
    let Some(start) = text.find(MARKER) else {
        return HashMap::new();
    };
    let text = &text[start + MARKER.len()..];
    let end = text.find(')').unwrap_or(text.len());
    text[..end]
        .split(',')
        .filter_map(|entry| {
            let (name, order) = entry.trim().rsplit_once(' ')?;
            Some((name.trim_matches('"').to_string(), order.to_lowercase()))
        })
        .collect()
}

fn split_static(definition: &str) -> (&str, bool) {
    match definition.strip_suffix(" STATIC") {
        Some(cql_type) => (cql_type, true),
        None => (definition, false),
    }
}

/// Apply an executed table, index or view statement to the catalog.
///
/// Keyspace, type, function and aggregate statements are only recorded.
fn apply_definition(catalog: &mut Catalog, statement: &str) {
    let applied = if statement.starts_with("CREATE TABLE") {
        create_table(catalog, statement)
    } else if statement.starts_with("ALTER TABLE") {
        alter_table(catalog, statement)
    } else if statement.starts_with("DROP TABLE") {
        quoted(statement).map(|(table, _)| {
            catalog.tables.remove(table);
        })
    } else if statement.starts_with("CREATE INDEX") {
        create_index(catalog, statement)
    } else if statement.starts_with("CREATE CUSTOM INDEX") {
        create_custom_index(catalog, statement)
    } else if statement.starts_with("DROP INDEX") {
        quoted(statement).map(|(name, _)| {
            for table in catalog.tables.values_mut() {
                table.indexes.retain(|row| row.get_str("index_name") != Some(name));
            }
        })
    } else if statement.starts_with("CREATE MATERIALIZED VIEW") {
        create_view(catalog, statement)
    } else if statement.starts_with("DROP MATERIALIZED VIEW") {
        quoted(statement).map(|(name, _)| {
            for table in catalog.tables.values_mut() {
                table.views.retain(|row| row.get_str("view_name") != Some(name));
                table.view_columns.retain(|row| row.get_str("table_name") != Some(name));
            }
        })
    } else {
        Some(())
    };

    assert!(applied.is_some(), "mock catalog cannot apply: {}", statement);
}

fn create_table(catalog: &mut Catalog, statement: &str) -> Option<()> {
    let (table, rest) = quoted(statement)?;
    if catalog.tables.contains_key(table) {
        return Some(());
    }
    let body = rest.trim_start().strip_prefix('(')?;
    let (definitions, rest) = body.split_once("PRIMARY KEY(")?;
    let (key, rest) = parse_key(rest)?;
    let order = parse_clustering_order(rest);

    let columns = definitions
        .split(" , ")
        .filter_map(|definition| {
            let (name, rest) = quoted(definition)?;
            let (cql_type, is_static) = split_static(rest.trim());
            Some(column_row(table, name, cql_type, is_static, &key, order.get(name).cloned()))
        })
        .collect();

    catalog.tables.insert(
        table.to_string(),
        TableCatalog {
            columns,
            ..Default::default()
        },
    );
    Some(())
}

fn alter_table(catalog: &mut Catalog, statement: &str) -> Option<()> {
    let (table, rest) = quoted(statement)?;
    let entry = catalog.tables.get_mut(table)?;
    let rest = rest.trim_start();

    if let Some(rest) = rest.strip_prefix("ADD ") {
        let (name, rest) = quoted(rest)?;
        let (cql_type, is_static) = split_static(rest.trim().trim_end_matches(';'));
        entry
            .columns
            .push(column_row(table, name, cql_type, is_static, &PrimaryKey::default(), None));
    } else if let Some(rest) = rest.strip_prefix("DROP ") {
        let (name, _) = quoted(rest)?;
        entry.columns.retain(|row| row.get_str("column_name") != Some(name));
    } else {
        let (name, rest) = quoted(rest.strip_prefix("ALTER ")?)?;
        let cql_type = rest.trim().strip_prefix("TYPE ")?.trim_end_matches(';');
        for row in entry.columns.iter_mut() {
            if row.get_str("column_name") == Some(name) {
                *row = row.clone().with("type", cql_type);
            }
        }
    }
    Some(())
}

fn create_index(catalog: &mut Catalog, statement: &str) -> Option<()> {
    let (table, rest) = quoted(statement)?;
    let target = rest.trim().strip_prefix('(')?.strip_suffix(");")?.replace('"', "");
    let row = index_row(table, &target);
    let entry = catalog.tables.get_mut(table)?;
    if !entry.indexes.contains(&row) {
        entry.indexes.push(row);
    }
    Some(())
}

fn create_custom_index(catalog: &mut Catalog, statement: &str) -> Option<()> {
    let (table, rest) = quoted(statement)?;
    let (on, rest) = quoted(rest)?;
    let (_, rest) = rest.split_once("USING '")?;
    let (using, rest) = rest.split_once('\'')?;

    let mut options = IndexMap::new();
    if let Some((_, body)) = rest.split_once('{') {
        let body = body.split('}').next()?;
        for entry in body.split(", ") {
            if let Some((key, value)) = entry.split_once(": ") {
                options.insert(key.trim_matches('\'').to_string(), value.trim_matches('\'').to_string());
            }
        }
    }

    let entry = catalog.tables.get_mut(table)?;
    let number = entry
        .indexes
        .iter()
        .filter(|row| row.get_str("kind") == Some("CUSTOM"))
        .count();
    entry.indexes.push(custom_index_row(table, number, on, using, &options));
    Some(())
}

fn create_view(catalog: &mut Catalog, statement: &str) -> Option<()> {
    let (view, rest) = quoted(statement)?;
    let rest = rest.strip_prefix(" AS SELECT ")?;
    let (select, rest) = rest.split_once(" FROM ")?;
    let (table, rest) = quoted(rest)?;
    let rest = rest.strip_prefix(" WHERE ")?;
    let (where_clause, rest) = rest.split_once(" PRIMARY KEY(")?;
    let (key, rest) = parse_key(rest)?;
    let order = parse_clustering_order(rest);

    let base = catalog.tables.get_mut(table)?;
    let selected = if select.trim() == "*" {
        base.columns
            .iter()
            .filter_map(|row| row.get_str("column_name").map(str::to_string))
            .collect()
    } else {
        name_list(select)
    };

    let mut columns = Vec::new();
    for name in &selected {
        let base_column = base.columns.iter().find(|row| row.get_str("column_name") == Some(name.as_str()))?;
        let cql_type = base_column.get_str("type")?;
        columns.push(column_row(view, name, cql_type, false, &key, order.get(name).cloned()));
    }

    base.views.push(
        Row::new()
            .with("view_name", view)
            .with("base_table_name", table)
            .with("where_clause", where_clause),
    );
    base.view_columns.extend(columns);
    Some(())
}

/// Oracle answering from a fixed script; refuses once the script runs out
#[derive(Default)]
pub struct ScriptedConfirmation {
    answers: Mutex<VecDeque<bool>>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedConfirmation {
    pub fn new(answers: &[bool]) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConfirmationOracle for ScriptedConfirmation {
    async fn confirm(&self, message: &str) -> bool {
        self.prompts.lock().unwrap().push(message.to_string());
        self.answers.lock().unwrap().pop_front().unwrap_or(false)
    }
}

/// Search target recording every call
#[derive(Default)]
pub struct RecordingSearch {
    pub calls: Mutex<Vec<String>>,
}

impl RecordingSearch {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchIndexSync for RecordingSearch {
    async fn assert_index(&self, keyspace: &str, index: &str) -> cql_sync::Result<()> {
        self.calls.lock().unwrap().push(format!("assert {} {}", keyspace, index));
        Ok(())
    }

    async fn put_mapping(&self, index: &str, mapping: &str, _body: &serde_json::Value) -> cql_sync::Result<()> {
        self.calls.lock().unwrap().push(format!("mapping {} {}", index, mapping));
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> cql_sync::Result<()> {
        self.calls.lock().unwrap().push(format!("delete {}", index));
        Ok(())
    }
}

pub fn migrations(mode: MigrationMode) -> MigrationsConfig {
    MigrationsConfig {
        mode,
        ..Default::default()
    }
}

pub fn reconciler(
    driver: &Arc<MockDriver>,
    confirmation: Arc<ScriptedConfirmation>,
    config: &MigrationsConfig,
) -> TableReconciler {
    TableReconciler::new(
        SchemaAnalyzer::new(driver.clone(), KEYSPACE),
        SchemaExecutor::new(driver.clone(), config.dry_run),
        confirmation,
        config,
    )
}

/// The schema most reconciliation tests start from
pub fn events_schema() -> ModelSchema {
    serde_json::from_value(serde_json::json!({
        "fields": {
            "user_id": "uuid",
            "ts": "timestamp",
            "kind": "text",
            "score": "int",
            "payload": "text",
            "tags": "set<text>",
            "attrs": "map<text, text>",
            "owner": { "type": "text", "static": true }
        },
        "key": ["user_id", "ts"],
        "clustering_order": { "ts": "desc" },
        "indexes": ["kind", "tags", "keys(attrs)"],
        "custom_indexes": [{
            "on": "payload",
            "using": "org.apache.cassandra.index.sasi.SASIIndex",
            "options": { "mode": "CONTAINS" }
        }],
        "materialized_views": {
            "events_by_kind": {
                "select": ["kind", "user_id", "ts", "score"],
                "key": ["kind", "user_id", "ts"],
                "clustering_order": { "ts": "desc" },
                "filters": { "score": { "$gt": 0 } }
            }
        }
    }))
    .unwrap()
}
