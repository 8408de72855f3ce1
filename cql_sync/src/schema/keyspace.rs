//! Keyspace, user defined type, function and aggregate reconciliation

use indexmap::IndexMap;
use std::collections::BTreeMap;

use crate::config::{AggregateDefinition, FunctionDefinition};
use crate::db::executor::SchemaExecutor;
use crate::error::{Error, Result};
use crate::schema::analyzer::{LiveAggregate, LiveFunction, SchemaAnalyzer};
use crate::schema::generator::Statement;
use crate::schema::normalizer::{normalize_replication, normalize_user_defined_type};

/// Creates the keyspace, or aligns its replication
pub struct KeyspaceReconciler {
    analyzer: SchemaAnalyzer,
    executor: SchemaExecutor,
}

impl KeyspaceReconciler {
    pub fn new(analyzer: SchemaAnalyzer, executor: SchemaExecutor) -> Self {
        Self { analyzer, executor }
    }

    /// Returns whether a statement was issued
    pub async fn reconcile(&self, replication: &IndexMap<String, serde_json::Value>) -> Result<bool> {
        let keyspace = self.analyzer.keyspace().to_string();
        let declared = normalize_replication(replication);

        let Some(live) = self.analyzer.keyspace_replication().await? else {
            tracing::info!(keyspace = %keyspace, "Creating keyspace");
            self.executor
                .execute(&Statement::CreateKeyspace {
                    keyspace,
                    replication: declared,
                })
                .await?;
            return Ok(true);
        };

        let live: IndexMap<String, serde_json::Value> = live
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect();
        if normalize_replication(&live) == declared {
            return Ok(false);
        }

        tracing::info!(keyspace = %keyspace, "Altering keyspace replication");
        self.executor
            .execute(&Statement::AlterKeyspace {
                keyspace: keyspace.clone(),
                replication: declared,
            })
            .await?;
        tracing::warn!(
            keyspace = %keyspace,
            "Keyspace replication changed, run a full repair on every node to redistribute data"
        );
        Ok(true)
    }
}

/// Creates missing user defined types
pub struct UdtReconciler {
    analyzer: SchemaAnalyzer,
    executor: SchemaExecutor,
}

impl UdtReconciler {
    pub fn new(analyzer: SchemaAnalyzer, executor: SchemaExecutor) -> Self {
        Self { analyzer, executor }
    }

    /// Assert every declared type, in declaration order.
    ///
    /// An existing type with different fields is an error: types are
    /// never altered or dropped here.
    pub async fn reconcile(&self, types: &IndexMap<String, IndexMap<String, String>>) -> Result<usize> {
        let mut created = 0;

        for (name, fields) in types {
            match self.analyzer.user_defined_type(name).await? {
                None => {
                    tracing::info!(udt = %name, "Creating user defined type");
                    self.executor
                        .execute(&Statement::CreateType {
                            name: name.clone(),
                            fields: fields.clone(),
                        })
                        .await?;
                    created += 1;
                }
                Some(live) => {
                    if normalize_fields(&live) != normalize_fields(fields) {
                        return Err(Error::UserDefinedTypeError(format!(
                            "user defined type \"{}\" already exists with different fields, \
                             drop or alter it manually",
                            name
                        )));
                    }
                }
            }
        }

        Ok(created)
    }
}

fn normalize_fields(fields: &IndexMap<String, String>) -> BTreeMap<String, String> {
    fields
        .iter()
        .map(|(name, field_type)| (name.clone(), normalize_user_defined_type(field_type)))
        .collect()
}

/// Creates or replaces user defined functions and aggregates
pub struct FunctionReconciler {
    analyzer: SchemaAnalyzer,
    executor: SchemaExecutor,
}

impl FunctionReconciler {
    pub fn new(analyzer: SchemaAnalyzer, executor: SchemaExecutor) -> Self {
        Self { analyzer, executor }
    }

    /// Assert every declared function; returns how many were (re)created
    pub async fn reconcile_functions(&self, functions: &IndexMap<String, FunctionDefinition>) -> Result<usize> {
        let mut replaced = 0;

        for (name, definition) in functions {
            validate_function(name, definition)?;

            let live = self.analyzer.user_defined_function(name).await?;
            if live.as_ref().map_or(false, |live| function_matches(definition, live)) {
                continue;
            }

            tracing::info!(udf = %name, exists = live.is_some(), "Creating user defined function");
            self.executor
                .execute(&Statement::CreateFunction {
                    name: name.clone(),
                    inputs: definition.inputs.clone(),
                    return_type: definition.return_type.clone(),
                    language: definition.language.clone(),
                    code: definition.code.clone(),
                })
                .await?;
            replaced += 1;
        }

        Ok(replaced)
    }

    /// Assert every declared aggregate; run after the functions they use
    pub async fn reconcile_aggregates(&self, aggregates: &IndexMap<String, AggregateDefinition>) -> Result<usize> {
        let mut replaced = 0;

        for (name, definition) in aggregates {
            validate_aggregate(name, definition)?;

            let overloads = self.analyzer.user_defined_aggregates(name).await?;
            if overloads.iter().any(|live| aggregate_matches(definition, live)) {
                continue;
            }

            tracing::info!(uda = %name, overloads = overloads.len(), "Creating user defined aggregate");
            self.executor
                .execute(&Statement::CreateAggregate {
                    name: name.clone(),
                    input_types: definition.input_types.clone(),
                    sfunc: definition.sfunc.clone(),
                    stype: definition.stype.clone(),
                    finalfunc: definition.finalfunc.clone(),
                    initcond: definition.initcond.clone(),
                })
                .await?;
            replaced += 1;
        }

        Ok(replaced)
    }
}

fn validate_function(name: &str, definition: &FunctionDefinition) -> Result<()> {
    let missing = [
        ("language", &definition.language),
        ("code", &definition.code),
        ("return_type", &definition.return_type),
    ]
    .into_iter()
    .find(|(_, value)| value.trim().is_empty());

    match missing {
        Some((key, _)) => Err(Error::UserDefinedFunctionError(format!(
            "function \"{}\" must define a non-empty {}",
            name, key
        ))),
        None => Ok(()),
    }
}

fn validate_aggregate(name: &str, definition: &AggregateDefinition) -> Result<()> {
    if definition.input_types.is_empty() {
        return Err(Error::UserDefinedAggregateError(format!(
            "aggregate \"{}\" must define at least one input type",
            name
        )));
    }
    if definition.sfunc.trim().is_empty() || definition.stype.trim().is_empty() {
        return Err(Error::UserDefinedAggregateError(format!(
            "aggregate \"{}\" must define sfunc and stype",
            name
        )));
    }
    Ok(())
}

fn normalize_types(types: impl IntoIterator<Item = impl AsRef<str>>) -> Vec<String> {
    types
        .into_iter()
        .map(|t| normalize_user_defined_type(t.as_ref()))
        .collect()
}

fn function_matches(definition: &FunctionDefinition, live: &LiveFunction) -> bool {
    definition.language.eq_ignore_ascii_case(&live.language)
        && definition.code == live.body
        && normalize_user_defined_type(&definition.return_type) == normalize_user_defined_type(&live.return_type)
        && definition.inputs.keys().eq(live.argument_names.iter())
        && normalize_types(definition.inputs.values()) == normalize_types(&live.argument_types)
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn aggregate_matches(definition: &AggregateDefinition, live: &LiveAggregate) -> bool {
    definition.sfunc.to_lowercase() == live.state_func
        && normalize_user_defined_type(&definition.stype) == normalize_user_defined_type(&live.state_type)
        && definition.finalfunc.as_ref().map(|f| f.to_lowercase()) == live.final_func
        && definition.initcond.as_deref().map(strip_whitespace) == live.initcond.as_deref().map(strip_whitespace)
        && normalize_types(&definition.input_types) == normalize_types(&live.argument_types)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_fields() {
        let mut a = IndexMap::new();
        a.insert("zip".to_string(), "int".to_string());
        a.insert("tags".to_string(), "frozen< set<text> >".to_string());

        let mut b = IndexMap::new();
        b.insert("tags".to_string(), "frozen<set<text>>".to_string());
        b.insert("zip".to_string(), "INT".to_string());

        assert_eq!(normalize_fields(&a), normalize_fields(&b));
    }

    fn average() -> AggregateDefinition {
        AggregateDefinition {
            input_types: vec!["int".to_string()],
            sfunc: "avg_state".to_string(),
            stype: "tuple<int, bigint>".to_string(),
            finalfunc: Some("avg_final".to_string()),
            initcond: Some("(0, 0)".to_string()),
        }
    }

    fn live_average() -> LiveAggregate {
        LiveAggregate {
            argument_types: vec!["int".to_string()],
            state_func: "avg_state".to_string(),
            state_type: "tuple<int,bigint>".to_string(),
            final_func: Some("avg_final".to_string()),
            initcond: Some("(0,0)".to_string()),
        }
    }

    #[test]
    fn test_aggregate_matches() {
        let mut live = live_average();
        assert!(aggregate_matches(&average(), &live));

        live.final_func = None;
        assert!(!aggregate_matches(&average(), &live));
    }

    #[test]
    fn test_aggregate_validation() {
        let mut definition = average();
        definition.input_types.clear();
        assert!(matches!(
            validate_aggregate("average", &definition),
            Err(Error::UserDefinedAggregateError(_))
        ));
    }
}
