//! Schema normalizer
//!
//! This module reduces declared and introspected schemas to a canonical form
//! so that two schemas needing no reconciliation compare equal.

use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::query::filter::compile_filter_ddl;
use crate::query::QueryObject;
use crate::schema::datatypes::CqlType;
use crate::schema::types::{
    ClusteringOrder, CustomIndex, FieldDef, MaterializedView, ModelSchema, NormalizedField,
    NormalizedSchema, NormalizedView, PrimaryKey,
};
use crate::utils::naming::{strip_quotes_and_whitespace, unquote_identifiers};
use crate::value::Value;

/// Canonical type keyword of a raw type string.
///
/// `map<text, int>` gives `map`, `frozen<address>` gives `frozen`. A string
/// with no known keyword is returned as [`CqlType::Other`], whitespace removed.
pub fn normalize_type(raw: &str) -> CqlType {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let keyword = compact
        .split(|c| matches!(c, '<' | ',' | '>'))
        .find_map(CqlType::from_keyword);
    keyword.unwrap_or_else(|| CqlType::Other(compact))
}

/// Bracketed parameter suffix of a raw type string, whitespace removed
pub fn extract_type_parameters(raw: &str) -> String {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    match compact.find('<') {
        Some(start) => compact[start..].to_string(),
        None => String::new(),
    }
}

/// Canonical form of a user defined type's field type
pub fn normalize_user_defined_type(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// Canonical replication options.
///
/// The catalog reports fully qualified strategy classes and stringified
/// numbers; declared options may use short class names and integers.
pub fn normalize_replication(options: &IndexMap<String, serde_json::Value>) -> BTreeMap<String, String> {
    options
        .iter()
        .map(|(key, value)| {
            let text = match value {
                serde_json::Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            };
            let text = if key == "class" {
                text.trim_start_matches("org.apache.cassandra.locator.").to_string()
            } else {
                text.parse::<i64>().map(|n| n.to_string()).unwrap_or(text)
            };
            (key.clone(), text)
        })
        .collect()
}

fn normalize_field(def: &FieldDef) -> NormalizedField {
    let type_def = match &def.type_def {
        Some(type_def) => type_def.chars().filter(|c| !c.is_whitespace()).collect(),
        None => extract_type_parameters(&def.field_type),
    };

    NormalizedField {
        field_type: normalize_type(&def.field_type),
        type_def,
        is_static: def.is_static,
    }
}

fn normalize_clustering_order(
    key: &PrimaryKey,
    order: &IndexMap<String, ClusteringOrder>,
) -> BTreeMap<String, ClusteringOrder> {
    key.clustering
        .iter()
        .map(|column| (column.clone(), order.get(column).copied().unwrap_or_default()))
        .collect()
}

/// Canonical index target.
///
/// Quotes and whitespace are dropped, function names lower-cased, and a bare
/// collection column becomes `values(col)` the way the catalog reports it.
pub fn normalize_index_target(target: &str, schema: &ModelSchema) -> String {
    let cleaned = strip_quotes_and_whitespace(target);

    if let Some(open) = cleaned.find('(') {
        let function = cleaned[..open].to_lowercase();
        return format!("{}{}", function, &cleaned[open..]);
    }

    let is_collection = schema
        .field(&cleaned)
        .map_or(false, |def| normalize_type(&def.field_type).is_collection());
    if is_collection {
        format!("values({})", cleaned)
    } else {
        cleaned
    }
}

fn normalize_custom_index(index: &CustomIndex) -> CustomIndex {
    CustomIndex {
        on: strip_quotes_and_whitespace(&index.on),
        using: index.using.trim().to_string(),
        options: index.options.clone(),
    }
}

/// Generate a view's where clause from its key and filters
pub fn generate_view_where_clause(schema: &ModelSchema, view: &MaterializedView) -> Result<String> {
    let mut clause = view
        .key
        .columns()
        .map(|column| format!("\"{}\" IS NOT NULL", column))
        .collect::<Vec<_>>()
        .join(" AND ");

    if let Some(filters) = &view.filters {
        let mut filters: QueryObject = match Value::from(filters) {
            Value::Map(map) => map,
            other => {
                return Err(Error::InvalidSchema(format!(
                    "materialized view filters must be an object, got {}",
                    other
                )))
            }
        };

        // Key columns are already constrained to be non-null
        for (field, relation) in filters.iter_mut() {
            if let Value::Map(operators) = relation {
                if view.key.contains(field) && matches!(operators.get("$isnt"), Some(Value::Null)) {
                    operators.shift_remove("$isnt");
                }
            }
        }
        filters.retain(|_, relation| !matches!(relation, Value::Map(m) if m.is_empty()));

        let ddl = compile_filter_ddl(schema, &filters, "AND")?;
        if !ddl.is_empty() {
            clause.push(' ');
            clause.push_str(&ddl.replace("IS NOT null", "IS NOT NULL"));
        }
    }

    Ok(unquote_identifiers(&clause).trim().to_string())
}

fn normalize_view(schema: &ModelSchema, view: &MaterializedView) -> Result<NormalizedView> {
    let mut select: BTreeSet<String> = if view.select.iter().any(|c| c.trim() == "*") {
        schema.persisted_fields().map(|(name, _)| name.clone()).collect()
    } else {
        view.select.iter().map(|c| strip_quotes_and_whitespace(c)).collect()
    };
    // The catalog lists key columns among a view's columns
    select.extend(view.key.columns().cloned());

    let where_clause = match &view.where_clause {
        Some(where_clause) => where_clause.trim().to_string(),
        None => generate_view_where_clause(schema, view)?,
    };

    Ok(NormalizedView {
        select: select.into_iter().collect(),
        key: view.key.clone(),
        clustering_order: normalize_clustering_order(&view.key, &view.clustering_order),
        where_clause,
    })
}

/// Reduce a schema to its canonical form
pub fn normalize_schema(schema: &ModelSchema) -> Result<NormalizedSchema> {
    let fields = schema
        .persisted_fields()
        .map(|(name, def)| (name.clone(), normalize_field(def)))
        .collect();

    let indexes: BTreeSet<String> = schema
        .indexes
        .iter()
        .map(|target| normalize_index_target(target, schema))
        .collect();

    let mut custom_indexes: Vec<CustomIndex> = schema.custom_indexes.iter().map(normalize_custom_index).collect();
    custom_indexes.sort_by_key(CustomIndex::content_hash);
    custom_indexes.dedup();

    let materialized_views = schema
        .materialized_views
        .iter()
        .map(|(name, view)| Ok((name.clone(), normalize_view(schema, view)?)))
        .collect::<Result<BTreeMap<_, _>>>()?;

    Ok(NormalizedSchema {
        fields,
        key: schema.key.clone(),
        clustering_order: normalize_clustering_order(&schema.key, &schema.clustering_order),
        indexes: indexes.into_iter().collect(),
        custom_indexes,
        materialized_views,
    })
}

/// Rebuild a declared schema from its canonical form
pub fn denormalize_schema(normalized: &NormalizedSchema) -> ModelSchema {
    let fields = normalized
        .fields
        .iter()
        .map(|(name, field)| {
            let mut def = FieldDef::new(field.field_type.as_str());
            if !field.type_def.is_empty() {
                def.type_def = Some(field.type_def.clone());
            }
            def.is_static = field.is_static;
            (name.clone(), def)
        })
        .collect();

    let materialized_views = normalized
        .materialized_views
        .iter()
        .map(|(name, view)| {
            let view = MaterializedView {
                select: view.select.clone(),
                key: view.key.clone(),
                clustering_order: view.clustering_order.iter().map(|(k, v)| (k.clone(), *v)).collect(),
                where_clause: Some(view.where_clause.clone()),
                filters: None,
            };
            (name.clone(), view)
        })
        .collect();

    ModelSchema {
        fields,
        key: normalized.key.clone(),
        clustering_order: normalized.clustering_order.iter().map(|(k, v)| (k.clone(), *v)).collect(),
        indexes: normalized.indexes.clone(),
        custom_indexes: normalized.custom_indexes.clone(),
        materialized_views,
        ..Default::default()
    }
}
