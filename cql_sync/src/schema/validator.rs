//! Declared schema validation
//!
//! Structural checks run on every model before it is registered, so the
//! reconciler never sees a schema it cannot express as DDL.

use crate::error::{Error, Result};
use crate::schema::datatypes::CqlType;
use crate::schema::normalizer::normalize_type;
use crate::schema::types::{MaterializedView, ModelSchema};
use crate::utils::naming::is_valid_table_name;

fn invalid(model: &str, message: String) -> Error {
    Error::InvalidSchema(format!("{}: {}", model, message))
}

/// Validate a declared schema
pub fn validate_model_schema(model: &str, schema: &ModelSchema) -> Result<()> {
    if let Some(table) = &schema.table_name {
        if !is_valid_table_name(table) {
            return Err(invalid(model, format!("invalid table name \"{}\"", table)));
        }
    }

    if schema.fields.is_empty() {
        return Err(invalid(model, "schema must declare at least one field".to_string()));
    }
    for (name, def) in schema.persisted_fields() {
        if def.field_type.trim().is_empty() {
            return Err(invalid(model, format!("field \"{}\" has no type", name)));
        }
    }

    validate_key(model, schema)?;
    validate_counters(model, schema)?;

    for (name, def) in schema.persisted_fields() {
        if !def.is_static {
            continue;
        }
        if schema.key.clustering.is_empty() {
            return Err(invalid(
                model,
                format!("static field \"{}\" requires clustering columns", name),
            ));
        }
        if schema.key.contains(name) {
            return Err(invalid(model, format!("key field \"{}\" cannot be static", name)));
        }
    }

    for target in &schema.indexes {
        if target.trim().is_empty() {
            return Err(invalid(model, "index target cannot be empty".to_string()));
        }
    }
    for index in &schema.custom_indexes {
        if schema.field(&index.on).is_none() {
            return Err(invalid(
                model,
                format!("custom index on undeclared field \"{}\"", index.on),
            ));
        }
        if index.using.trim().is_empty() {
            return Err(invalid(
                model,
                format!("custom index on \"{}\" has no implementation class", index.on),
            ));
        }
    }

    for (name, view) in &schema.materialized_views {
        validate_view(model, schema, name, view)?;
    }

    Ok(())
}

fn validate_key(model: &str, schema: &ModelSchema) -> Result<()> {
    if schema.key.is_empty() {
        return Err(invalid(model, "primary key must have a partition key".to_string()));
    }

    let mut seen = Vec::new();
    for column in schema.key.columns() {
        if schema.field(column).is_none() {
            return Err(invalid(
                model,
                format!("key column \"{}\" is not a declared field", column),
            ));
        }
        if seen.contains(&column) {
            return Err(invalid(model, format!("key column \"{}\" appears twice", column)));
        }
        seen.push(column);
    }

    for column in schema.clustering_order.keys() {
        if !schema.key.clustering.contains(column) {
            return Err(invalid(
                model,
                format!("clustering order on \"{}\", which is not a clustering column", column),
            ));
        }
    }

    Ok(())
}

/// Counter tables hold only counters outside the key
fn validate_counters(model: &str, schema: &ModelSchema) -> Result<()> {
    let counter = |t: &str| normalize_type(t) == CqlType::Counter;
    let has_counter = schema.persisted_fields().any(|(_, def)| counter(&def.field_type));
    if !has_counter {
        return Ok(());
    }

    for (name, def) in schema.persisted_fields() {
        let is_key = schema.key.contains(name);
        if is_key && counter(&def.field_type) {
            return Err(invalid(model, format!("key field \"{}\" cannot be a counter", name)));
        }
        if !is_key && !counter(&def.field_type) {
            return Err(invalid(
                model,
                format!("counter tables may only hold counter fields outside the key, \"{}\" is not one", name),
            ));
        }
    }

    Ok(())
}

fn validate_view(model: &str, schema: &ModelSchema, name: &str, view: &MaterializedView) -> Result<()> {
    if view.select.is_empty() {
        return Err(invalid(model, format!("materialized view \"{}\" selects nothing", name)));
    }
    for column in &view.select {
        if column.trim() != "*" && schema.field(column.trim()).is_none() {
            return Err(invalid(
                model,
                format!("materialized view \"{}\" selects undeclared field \"{}\"", name, column),
            ));
        }
    }

    if view.key.is_empty() {
        return Err(invalid(model, format!("materialized view \"{}\" has no key", name)));
    }
    for column in view.key.columns() {
        if schema.field(column).is_none() {
            return Err(invalid(
                model,
                format!("materialized view \"{}\" key uses undeclared field \"{}\"", name, column),
            ));
        }
    }
    for column in schema.key.columns() {
        if !view.key.contains(column) {
            return Err(invalid(
                model,
                format!("materialized view \"{}\" key must include table key column \"{}\"", name, column),
            ));
        }
    }
    for column in view.clustering_order.keys() {
        if !view.key.clustering.contains(column) {
            return Err(invalid(
                model,
                format!(
                    "materialized view \"{}\" orders by \"{}\", which is not one of its clustering columns",
                    name, column
                ),
            ));
        }
    }

    Ok(())
}
