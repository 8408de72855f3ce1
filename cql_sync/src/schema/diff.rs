//! Schema difference calculator
//!
//! This module compares a normalized declared schema with the normalized
//! live schema of the same table and turns the differences into an ordered
//! migration plan, or reports that only a full drop and recreate can
//! converge the two.

use std::collections::{BTreeSet, HashMap};

use crate::schema::datatypes::SafeTypeChange;
use crate::schema::generator::{AlterAction, IndexTarget, Statement};
use crate::schema::normalizer::normalize_index_target;
use crate::schema::types::{CustomIndex, LiveSchema, NormalizedField, NormalizedSchema, NormalizedView};

/// Which part of a field definition changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAxis {
    Type,
    TypeParameters,
    Static,
}

/// A field-level difference between live and declared schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldDifference {
    Added {
        field: String,
        to: NormalizedField,
    },
    Removed {
        field: String,
    },
    /// At most one per field; a type change wins over the other axes
    Changed {
        field: String,
        axis: ChangeAxis,
        from: NormalizedField,
        to: NormalizedField,
    },
}

/// Compute per-field differences, ordered by field name
pub fn diff_fields(live: &NormalizedSchema, declared: &NormalizedSchema) -> Vec<FieldDifference> {
    let names: BTreeSet<&String> = live.fields.keys().chain(declared.fields.keys()).collect();

    names
        .into_iter()
        .filter_map(|name| match (live.fields.get(name), declared.fields.get(name)) {
            (None, Some(to)) => Some(FieldDifference::Added {
                field: name.clone(),
                to: to.clone(),
            }),
            (Some(_), None) => Some(FieldDifference::Removed { field: name.clone() }),
            (Some(from), Some(to)) => {
                let axis = if from.field_type != to.field_type {
                    ChangeAxis::Type
                } else if from.type_def != to.type_def {
                    ChangeAxis::TypeParameters
                } else if from.is_static != to.is_static {
                    ChangeAxis::Static
                } else {
                    return None;
                };
                Some(FieldDifference::Changed {
                    field: name.clone(),
                    axis,
                    from: from.clone(),
                    to: to.clone(),
                })
            }
            (None, None) => None,
        })
        .collect()
}

/// One `ALTER TABLE` step.
///
/// Steps that lose data carry the confirmation prompt that must be accepted
/// before they run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlterOperation {
    pub field: String,
    pub action: AlterAction,
    pub confirmation: Option<String>,
}

impl AlterOperation {
    pub fn statement(&self, table: &str) -> Statement {
        Statement::AlterTable {
            table: table.to_string(),
            field: self.field.clone(),
            action: self.action.clone(),
        }
    }

    pub fn is_drop(&self) -> bool {
        matches!(self.action, AlterAction::Drop)
    }
}

/// Everything an alter pass applies, in application order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationPlan {
    pub removed_views: Vec<String>,
    /// Physical names of plain and custom indexes to drop
    pub removed_indexes: Vec<String>,
    pub operations: Vec<AlterOperation>,
    pub added_indexes: Vec<String>,
    pub added_custom_indexes: Vec<CustomIndex>,
    pub added_views: Vec<(String, NormalizedView)>,
}

impl MigrationPlan {
    pub fn is_empty(&self) -> bool {
        self.removed_views.is_empty()
            && self.removed_indexes.is_empty()
            && self.operations.is_empty()
            && self.added_indexes.is_empty()
            && self.added_custom_indexes.is_empty()
            && self.added_views.is_empty()
    }
}

/// Outcome of planning an alter pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlterPlan {
    Operations(MigrationPlan),
    /// A key column changed type; only drop and recreate can apply it
    Impossible { field: String },
}

/// How a differing table is migrated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStrategy {
    Alter,
    DropRecreate,
}

/// Alter only when the primary key and clustering order are unchanged
pub fn select_migration_strategy(declared: &NormalizedSchema, live: &NormalizedSchema) -> MigrationStrategy {
    if declared.key == live.key && declared.clustering_order == live.clustering_order {
        MigrationStrategy::Alter
    } else {
        MigrationStrategy::DropRecreate
    }
}

/// Plain index difference: `(removed physical names, added targets)`
pub fn diff_indexes(
    live: &LiveSchema,
    live_normalized: &NormalizedSchema,
    declared: &NormalizedSchema,
) -> (Vec<String>, Vec<String>) {
    let removed = live_normalized
        .indexes
        .iter()
        .filter(|target| !declared.indexes.contains(target))
        .filter_map(|target| physical_index_name(live, target))
        .collect();

    let added = declared
        .indexes
        .iter()
        .filter(|target| !live_normalized.indexes.contains(target))
        .cloned()
        .collect();

    (removed, added)
}

fn physical_index_name(live: &LiveSchema, target: &str) -> Option<String> {
    let found = live.index_names.get(target).cloned().or_else(|| {
        live.index_names
            .iter()
            .find(|(key, _)| normalize_index_target(key, &live.schema) == target)
            .map(|(_, name)| name.clone())
    });

    if found.is_none() {
        tracing::warn!(index = target, "No physical name found for removed index");
    }
    found
}

/// Custom index difference: `(removed physical names, added indexes)`
pub fn diff_custom_indexes(
    index_names: &HashMap<String, String>,
    live: &NormalizedSchema,
    declared: &NormalizedSchema,
) -> (Vec<String>, Vec<CustomIndex>) {
    let removed = live
        .custom_indexes
        .iter()
        .filter(|index| !declared.custom_indexes.contains(index))
        .filter_map(|index| {
            let name = index_names.get(&index.content_hash()).cloned();
            if name.is_none() {
                tracing::warn!(index = %index.on, "No physical name found for removed custom index");
            }
            name
        })
        .collect();

    let added = declared
        .custom_indexes
        .iter()
        .filter(|index| !live.custom_indexes.contains(index))
        .cloned()
        .collect();

    (removed, added)
}

/// View difference: `(removed names, added views)`; a changed view is both
pub fn diff_materialized_views(
    live: &NormalizedSchema,
    declared: &NormalizedSchema,
) -> (Vec<String>, Vec<(String, NormalizedView)>) {
    let removed = live
        .materialized_views
        .iter()
        .filter(|(name, view)| declared.materialized_views.get(*name) != Some(*view))
        .map(|(name, _)| name.clone())
        .collect();

    let added = declared
        .materialized_views
        .iter()
        .filter(|(name, view)| live.materialized_views.get(*name) != Some(*view))
        .map(|(name, view)| (name.clone(), view.clone()))
        .collect();

    (removed, added)
}

fn removed_field_message(table: &str, field: &str) -> String {
    format!(
        "Schema for table \"{}\" has removed field \"{}\", all data in the field will lost, \
         are you sure you want to alter to drop the field?",
        table, field
    )
}

fn changed_type_message(table: &str, field: &str) -> String {
    format!(
        "Schema for table \"{}\" has new type for field \"{}\", all data in the field will be lost, \
         are you sure you want to drop the field & recreate it?",
        table, field
    )
}

/// Plan an alter pass from `live` to `declared`
pub fn plan_alter_operations(
    table: &str,
    live: &LiveSchema,
    live_normalized: &NormalizedSchema,
    declared: &NormalizedSchema,
) -> AlterPlan {
    let mut operations = Vec::new();
    // Fields whose data goes away; views reading them must be dropped first
    let mut dropped_fields = Vec::new();

    for difference in diff_fields(live_normalized, declared) {
        match difference {
            FieldDifference::Added { field, to } => operations.push(AlterOperation {
                field,
                action: AlterAction::Add {
                    cql_type: to.full_type(),
                    is_static: to.is_static,
                },
                confirmation: None,
            }),
            FieldDifference::Removed { field } => {
                operations.push(AlterOperation {
                    confirmation: Some(removed_field_message(table, &field)),
                    field: field.clone(),
                    action: AlterAction::Drop,
                });
                dropped_fields.push(field);
            }
            FieldDifference::Changed { field, axis, from, to } => {
                if declared.key.contains(&field) || live_normalized.key.contains(&field) {
                    return AlterPlan::Impossible { field };
                }

                let safe = match axis {
                    ChangeAxis::Type => SafeTypeChange::new(&from.field_type, &to.field_type),
                    _ => None,
                };
                match safe {
                    Some(change) => {
                        tracing::debug!(
                            field = %field,
                            from = %change.from_type(),
                            to = %change.to_type(),
                            "Type change can be applied in place"
                        );
                        operations.push(AlterOperation {
                            field,
                            action: AlterAction::Alter(change),
                            confirmation: None,
                        })
                    }
                    None => {
                        operations.push(AlterOperation {
                            field: field.clone(),
                            action: AlterAction::Drop,
                            confirmation: Some(changed_type_message(table, &field)),
                        });
                        operations.push(AlterOperation {
                            field: field.clone(),
                            action: AlterAction::Add {
                                cql_type: to.full_type(),
                                is_static: to.is_static,
                            },
                            confirmation: None,
                        });
                        dropped_fields.push(field);
                    }
                }
            }
        }
    }

    let (mut removed_indexes, mut added_indexes) = diff_indexes(live, live_normalized, declared);
    let (mut removed_custom, mut added_custom_indexes) =
        diff_custom_indexes(&live.index_names, live_normalized, declared);
    let (mut removed_views, mut added_views) = diff_materialized_views(live_normalized, declared);

    // Indexes on a dropped column go with it and are rebuilt when still declared
    for target in &live_normalized.indexes {
        if !dropped_fields.contains(&IndexTarget::parse(target).column) {
            continue;
        }
        if let Some(name) = physical_index_name(live, target) {
            if !removed_indexes.contains(&name) {
                removed_indexes.push(name);
            }
        }
        if declared.indexes.contains(target) && !added_indexes.contains(target) {
            added_indexes.push(target.clone());
        }
    }
    for index in &live_normalized.custom_indexes {
        if !dropped_fields.contains(&index.on) {
            continue;
        }
        if let Some(name) = live.index_names.get(&index.content_hash()) {
            if !removed_custom.contains(name) {
                removed_custom.push(name.clone());
            }
        }
        if declared.custom_indexes.contains(index) && !added_custom_indexes.contains(index) {
            added_custom_indexes.push(index.clone());
        }
    }

    for (name, view) in &live_normalized.materialized_views {
        if removed_views.contains(name) || !dropped_fields.iter().any(|f| view.depends_on(f)) {
            continue;
        }
        removed_views.push(name.clone());
        if let Some(declared_view) = declared.materialized_views.get(name) {
            if !added_views.iter().any(|(n, _)| n == name) {
                added_views.push((name.clone(), declared_view.clone()));
            }
        }
    }
    removed_views.sort();
    added_views.sort_by(|a, b| a.0.cmp(&b.0));

    AlterPlan::Operations(MigrationPlan {
        removed_views,
        removed_indexes: removed_indexes.into_iter().chain(removed_custom).collect(),
        operations,
        added_indexes,
        added_custom_indexes,
        added_views,
    })
}
