//! DDL statement generator
//!
//! This module holds a small typed statement tree for every schema
//! definition statement the library issues, rendered to CQL text by a single
//! `Display` implementation.

use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;
use crate::schema::datatypes::SafeTypeChange;
use crate::schema::normalizer::normalize_schema;
use crate::schema::types::{ClusteringOrder, CustomIndex, ModelSchema, NormalizedSchema, NormalizedView, PrimaryKey};
use crate::value::quote_literal;

/// A column in a `CREATE TABLE`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub cql_type: String,
    pub is_static: bool,
}

/// The change an `ALTER TABLE` applies to one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlterAction {
    Add { cql_type: String, is_static: bool },
    Drop,
    /// In-place type change; only whitelisted conversions can be expressed
    Alter(SafeTypeChange),
}

/// Target of a plain secondary index: a column, optionally wrapped in `keys`, `values`, `entries` or `full`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTarget {
    pub function: Option<String>,
    pub column: String,
}

impl IndexTarget {
    /// Parse a normalized target such as `email` or `keys(scores)`
    pub fn parse(target: &str) -> Self {
        match (target.find('('), target.rfind(')')) {
            (Some(open), Some(close)) if open < close => Self {
                function: Some(target[..open].to_lowercase()),
                column: target[open + 1..close].trim_matches('"').to_string(),
            },
            _ => Self {
                function: None,
                column: target.trim_matches('"').to_string(),
            },
        }
    }
}

impl fmt::Display for IndexTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.function {
            Some(function) => write!(f, "{}(\"{}\")", function, self.column),
            None => write!(f, "\"{}\"", self.column),
        }
    }
}

/// A schema definition statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    CreateTable {
        table: String,
        columns: Vec<ColumnDefinition>,
        key: PrimaryKey,
        clustering_order: Vec<(String, ClusteringOrder)>,
    },
    AlterTable {
        table: String,
        field: String,
        action: AlterAction,
    },
    DropTable {
        table: String,
    },
    CreateIndex {
        table: String,
        target: IndexTarget,
    },
    CreateCustomIndex {
        table: String,
        index: CustomIndex,
    },
    DropIndex {
        name: String,
    },
    CreateMaterializedView {
        view: String,
        table: String,
        select: Vec<String>,
        where_clause: String,
        key: PrimaryKey,
        clustering_order: Vec<(String, ClusteringOrder)>,
    },
    DropMaterializedView {
        view: String,
    },
    CreateKeyspace {
        keyspace: String,
        replication: BTreeMap<String, String>,
    },
    AlterKeyspace {
        keyspace: String,
        replication: BTreeMap<String, String>,
    },
    CreateType {
        name: String,
        fields: IndexMap<String, String>,
    },
    CreateFunction {
        name: String,
        inputs: IndexMap<String, String>,
        return_type: String,
        language: String,
        code: String,
    },
    CreateAggregate {
        name: String,
        input_types: Vec<String>,
        sfunc: String,
        stype: String,
        finalfunc: Option<String>,
        initcond: Option<String>,
    },
}

fn quoted_list<'a>(names: impl Iterator<Item = &'a String>, separator: &str) -> String {
    names.map(|n| format!("\"{}\"", n)).collect::<Vec<_>>().join(separator)
}

fn write_primary_key(f: &mut fmt::Formatter<'_>, key: &PrimaryKey) -> fmt::Result {
    write!(f, "PRIMARY KEY(({})", quoted_list(key.partition.iter(), ","))?;
    if !key.clustering.is_empty() {
        write!(f, ",{}", quoted_list(key.clustering.iter(), ","))?;
    }
    f.write_str(")")
}

fn write_clustering_order(f: &mut fmt::Formatter<'_>, order: &[(String, ClusteringOrder)]) -> fmt::Result {
    if order.is_empty() {
        return Ok(());
    }
    let order: Vec<String> = order
        .iter()
        .map(|(column, direction)| format!("\"{}\" {}", column, direction))
        .collect();
    write!(f, " WITH CLUSTERING ORDER BY ({})", order.join(","))
}

fn render_options<'a>(options: impl Iterator<Item = (&'a String, &'a String)>) -> String {
    let entries: Vec<String> = options
        .map(|(k, v)| format!("{}: {}", quote_literal(k), quote_literal(v)))
        .collect();
    format!("{{{}}}", entries.join(", "))
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::CreateTable {
                table,
                columns,
                key,
                clustering_order,
            } => {
                let columns: Vec<String> = columns
                    .iter()
                    .map(|c| {
                        let suffix = if c.is_static { " STATIC" } else { "" };
                        format!("\"{}\" {}{}", c.name, c.cql_type, suffix)
                    })
                    .collect();
                write!(f, "CREATE TABLE IF NOT EXISTS \"{}\" ({} , ", table, columns.join(" , "))?;
                write_primary_key(f, key)?;
                f.write_str(")")?;
                write_clustering_order(f, clustering_order)?;
                f.write_str(";")
            }
            Statement::AlterTable { table, field, action } => match action {
                AlterAction::Add { cql_type, is_static } => {
                    let suffix = if *is_static { " STATIC" } else { "" };
                    write!(f, "ALTER TABLE \"{}\" ADD \"{}\" {}{};", table, field, cql_type, suffix)
                }
                AlterAction::Drop => write!(f, "ALTER TABLE \"{}\" DROP \"{}\";", table, field),
                AlterAction::Alter(change) => write!(
                    f,
                    "ALTER TABLE \"{}\" ALTER \"{}\" TYPE {};",
                    table,
                    field,
                    change.to_type()
                ),
            },
            Statement::DropTable { table } => write!(f, "DROP TABLE IF EXISTS \"{}\";", table),
            Statement::CreateIndex { table, target } => {
                write!(f, "CREATE INDEX IF NOT EXISTS ON \"{}\" ({});", table, target)
            }
            Statement::CreateCustomIndex { table, index } => {
                write!(
                    f,
                    "CREATE CUSTOM INDEX IF NOT EXISTS ON \"{}\" (\"{}\") USING {}",
                    table,
                    index.on,
                    quote_literal(&index.using)
                )?;
                if !index.options.is_empty() {
                    write!(f, " WITH OPTIONS = {}", render_options(index.options.iter()))?;
                }
                f.write_str(";")
            }
            Statement::DropIndex { name } => write!(f, "DROP INDEX IF EXISTS \"{}\";", name),
            Statement::CreateMaterializedView {
                view,
                table,
                select,
                where_clause,
                key,
                clustering_order,
            } => {
                let select: Vec<String> = select
                    .iter()
                    .map(|c| if c == "*" { c.clone() } else { format!("\"{}\"", c) })
                    .collect();
                write!(
                    f,
                    "CREATE MATERIALIZED VIEW IF NOT EXISTS \"{}\" AS SELECT {} FROM \"{}\" WHERE {} ",
                    view,
                    select.join(" , "),
                    table,
                    where_clause
                )?;
                write_primary_key(f, key)?;
                write_clustering_order(f, clustering_order)?;
                f.write_str(";")
            }
            Statement::DropMaterializedView { view } => {
                write!(f, "DROP MATERIALIZED VIEW IF EXISTS \"{}\";", view)
            }
            Statement::CreateKeyspace { keyspace, replication } => write!(
                f,
                "CREATE KEYSPACE IF NOT EXISTS \"{}\" WITH REPLICATION = {};",
                keyspace,
                render_options(replication.iter())
            ),
            Statement::AlterKeyspace { keyspace, replication } => write!(
                f,
                "ALTER KEYSPACE \"{}\" WITH REPLICATION = {};",
                keyspace,
                render_options(replication.iter())
            ),
            Statement::CreateType { name, fields } => {
                let fields: Vec<String> = fields
                    .iter()
                    .map(|(field, field_type)| format!("\"{}\" {}", field, field_type))
                    .collect();
                write!(f, "CREATE TYPE IF NOT EXISTS \"{}\" ({});", name, fields.join(","))
            }
            Statement::CreateFunction {
                name,
                inputs,
                return_type,
                language,
                code,
            } => {
                let inputs: Vec<String> = inputs
                    .iter()
                    .map(|(argument, argument_type)| format!("\"{}\" {}", argument, argument_type))
                    .collect();
                write!(
                    f,
                    "CREATE OR REPLACE FUNCTION \"{}\" ({}) CALLED ON NULL INPUT RETURNS {} LANGUAGE {} AS {};",
                    name,
                    inputs.join(","),
                    return_type,
                    language,
                    quote_literal(code)
                )
            }
            Statement::CreateAggregate {
                name,
                input_types,
                sfunc,
                stype,
                finalfunc,
                initcond,
            } => {
                write!(
                    f,
                    "CREATE OR REPLACE AGGREGATE \"{}\" ({}) SFUNC \"{}\" STYPE {}",
                    name,
                    input_types.join(","),
                    sfunc,
                    stype
                )?;
                if let Some(finalfunc) = finalfunc {
                    write!(f, " FINALFUNC \"{}\"", finalfunc)?;
                }
                if let Some(initcond) = initcond {
                    write!(f, " INITCOND {}", initcond)?;
                }
                f.write_str(";")
            }
        }
    }
}

fn ordered_clustering(key: &PrimaryKey, order: &BTreeMap<String, ClusteringOrder>) -> Vec<(String, ClusteringOrder)> {
    key.clustering
        .iter()
        .map(|column| (column.clone(), order.get(column).copied().unwrap_or_default()))
        .collect()
}

/// `CREATE TABLE` for a normalized schema
pub fn create_table_statement(table: &str, schema: &NormalizedSchema, declared: &ModelSchema) -> Statement {
    // Declaration order reads better than the sorted normalized order
    let columns = declared
        .persisted_fields()
        .filter_map(|(name, _)| {
            schema.fields.get(name).map(|field| ColumnDefinition {
                name: name.clone(),
                cql_type: field.full_type(),
                is_static: field.is_static,
            })
        })
        .collect();

    Statement::CreateTable {
        table: table.to_string(),
        columns,
        key: schema.key.clone(),
        clustering_order: ordered_clustering(&schema.key, &schema.clustering_order),
    }
}

/// `CREATE INDEX` for a normalized index target
pub fn create_index_statement(table: &str, target: &str) -> Statement {
    Statement::CreateIndex {
        table: table.to_string(),
        target: IndexTarget::parse(target),
    }
}

pub fn create_custom_index_statement(table: &str, index: &CustomIndex) -> Statement {
    Statement::CreateCustomIndex {
        table: table.to_string(),
        index: index.clone(),
    }
}

/// `CREATE MATERIALIZED VIEW` for a normalized view
pub fn create_view_statement(table: &str, name: &str, view: &NormalizedView) -> Statement {
    Statement::CreateMaterializedView {
        view: name.to_string(),
        table: table.to_string(),
        select: view.select.clone(),
        where_clause: view.where_clause.clone(),
        key: view.key.clone(),
        clustering_order: ordered_clustering(&view.key, &view.clustering_order),
    }
}

/// Everything needed to create a table from scratch: table, indexes, custom indexes, views
pub fn schema_creation_statements(table: &str, schema: &ModelSchema) -> Result<Vec<Statement>> {
    let normalized = normalize_schema(schema)?;

    let mut statements = vec![create_table_statement(table, &normalized, schema)];
    statements.extend(normalized.indexes.iter().map(|t| create_index_statement(table, t)));
    statements.extend(
        normalized
            .custom_indexes
            .iter()
            .map(|index| create_custom_index_statement(table, index)),
    );
    statements.extend(
        normalized
            .materialized_views
            .iter()
            .map(|(name, view)| create_view_statement(table, name, view)),
    );

    Ok(statements)
}
