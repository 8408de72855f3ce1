//! Statement builders
//!
//! This module assembles complete SELECT/INSERT/UPDATE/DELETE statements
//! from the compiled fragments.

use crate::error::{Error, Result};
use crate::models::record::Record;
use crate::query::clauses::{compile_group_by, compile_limit, compile_order_by, compile_select};
use crate::query::expression::{compile_save_expression, compile_update_values};
use crate::query::filter::{compile_if_clause, compile_where_clause};
use crate::query::QueryObject;
use crate::schema::types::ModelSchema;
use crate::value::Value;

/// A statement ready to hand to the driver
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub query: String,
    pub params: Vec<Value>,
}

/// Options for `SELECT`
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub select: Vec<String>,
    pub distinct: bool,
    /// Read from this materialized view instead of the base table
    pub materialized_view: Option<String>,
    pub allow_filtering: bool,
}

/// Options for `UPDATE`
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    pub ttl: Option<i64>,
    pub conditions: Option<QueryObject>,
    pub if_exists: bool,
}

/// Options for `INSERT`
#[derive(Debug, Clone, Default)]
pub struct InsertOptions {
    pub ttl: Option<i64>,
    pub if_not_exists: bool,
}

fn join_parts(parts: &[&str]) -> String {
    let joined = parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    format!("{};", joined)
}

/// Build a `SELECT` statement
pub fn build_find(
    schema: &ModelSchema,
    table: &str,
    query: &QueryObject,
    options: &FindOptions,
) -> Result<CompiledStatement> {
    let (where_clause, params) = compile_where_clause(schema, query)?;
    let group_by = compile_group_by(query)?;
    let order_by = compile_order_by(query)?;
    let limit = compile_limit(query)?;

    let mut select = compile_select(&options.select);
    if options.distinct {
        select = format!("DISTINCT {}", select);
    }
    let from = format!("FROM \"{}\"", options.materialized_view.as_deref().unwrap_or(table));
    let allow_filtering = if options.allow_filtering { "ALLOW FILTERING" } else { "" };

    Ok(CompiledStatement {
        query: join_parts(&[
            "SELECT",
            &select,
            &from,
            &where_clause,
            &group_by,
            &order_by,
            &limit,
            allow_filtering,
        ]),
        params,
    })
}

/// Build an `UPDATE` statement; parameters are TTL, then assignments, then relations, then conditions
pub fn build_update(
    schema: &ModelSchema,
    table: &str,
    query: &QueryObject,
    update: &QueryObject,
    options: &UpdateOptions,
) -> Result<CompiledStatement> {
    let assignments = compile_update_values(schema, update)?;
    if assignments.clauses.is_empty() {
        return Err(Error::InvalidValue(format!(
            "update on \"{}\" does not set any field",
            table
        )));
    }
    let (where_clause, where_params) = compile_where_clause(schema, query)?;

    let mut params = Vec::new();
    let using_ttl = match options.ttl {
        Some(ttl) => {
            params.push(Value::Int(ttl));
            "USING TTL ?"
        }
        None => "",
    };
    params.extend(assignments.params);
    params.extend(where_params);

    let condition = match &options.conditions {
        Some(conditions) => {
            let (if_clause, if_params) = compile_if_clause(schema, conditions)?;
            params.extend(if_params);
            if_clause
        }
        None if options.if_exists => "IF EXISTS".to_string(),
        None => String::new(),
    };

    let set = format!("SET {}", assignments.clauses.join(", "));
    let target = format!("UPDATE \"{}\"", table);

    Ok(CompiledStatement {
        query: join_parts(&[&target, using_ttl, &set, &where_clause, &condition]),
        params,
    })
}

/// Build a `DELETE` statement
pub fn build_delete(schema: &ModelSchema, table: &str, query: &QueryObject) -> Result<CompiledStatement> {
    let (where_clause, params) = compile_where_clause(schema, query)?;
    if where_clause.is_empty() {
        return Err(Error::InvalidValue(format!(
            "delete on \"{}\" requires a where clause",
            table
        )));
    }

    Ok(CompiledStatement {
        query: format!("DELETE FROM \"{}\" {};", table, where_clause),
        params,
    })
}

/// Build an `INSERT` statement
pub fn build_insert(
    schema: &ModelSchema,
    table: &str,
    values: &QueryObject,
    options: &InsertOptions,
) -> Result<CompiledStatement> {
    let save = compile_save_expression(schema, values)?;

    let mut query = format!(
        "INSERT INTO \"{}\" ( {} ) VALUES ( {} )",
        table,
        save.identifiers.join(" , "),
        save.values.join(" , ")
    );
    let mut params = save.params;

    if options.if_not_exists {
        query.push_str(" IF NOT EXISTS");
    }
    if let Some(ttl) = options.ttl {
        query.push_str(" USING TTL ?");
        params.push(Value::Int(ttl));
    }
    query.push(';');

    Ok(CompiledStatement { query, params })
}

/// Build an `INSERT` for a record
pub fn build_record_insert<R: Record>(
    schema: &ModelSchema,
    record: &R,
    options: &InsertOptions,
) -> Result<CompiledStatement> {
    build_insert(schema, R::table_name(), &record.to_values(), options)
}

/// Build a `DELETE` addressing a record by its primary key
pub fn build_record_delete<R: Record>(schema: &ModelSchema, record: &R) -> Result<CompiledStatement> {
    let values = record.to_values();
    let mut query = QueryObject::new();
    for column in schema.key.columns() {
        let value = values
            .get(column)
            .filter(|v| !v.is_null_or_unset())
            .ok_or_else(|| Error::UnsetNotAllowed {
                operation: "delete".to_string(),
                field: column.clone(),
                reason: "primary key".to_string(),
            })?;
        query.insert(column.clone(), value.clone());
    }
    build_delete(schema, R::table_name(), &query)
}
