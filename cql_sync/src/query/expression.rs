//! Value and update expression compiler
//!
//! This module turns single field values, update operators, and whole
//! records into statement fragments plus their bound parameters.

use std::fmt;

use crate::error::{Error, Result};
use crate::query::QueryObject;
use crate::schema::datatypes::CqlType;
use crate::schema::normalizer::normalize_type;
use crate::schema::types::{FieldDef, ModelSchema};
use crate::value::Value;

/// A compiled value: either a placeholder fragment with its parameter, or literal text
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Bound { segment: String, parameter: Value },
    Literal(String),
}

impl DbValue {
    fn placeholder(parameter: Value) -> Self {
        DbValue::Bound {
            segment: "?".to_string(),
            parameter,
        }
    }
}

/// Look up the canonical type of a declared field
pub fn field_type(schema: &ModelSchema, field: &str) -> Result<CqlType> {
    schema
        .fields
        .get(field)
        .map(|def| normalize_type(&def.field_type))
        .ok_or_else(|| Error::UnknownField(field.to_string()))
}

/// Compile a single value for `field`
pub fn compile_value_expression(schema: &ModelSchema, field: &str, value: &Value) -> Result<DbValue> {
    if value.is_null_or_unset() {
        return Ok(DbValue::placeholder(value.clone()));
    }

    if let Value::DbFunction(function) = value {
        return Ok(DbValue::Literal(function.clone()));
    }

    let field_type = field_type(schema, field)?;

    // Several values against a scalar column bind as one parameter (IN lists)
    if let Value::List(items) = value {
        if !matches!(
            field_type,
            CqlType::List | CqlType::Set | CqlType::Frozen | CqlType::Tuple
        ) {
            let parameters = items
                .iter()
                .map(|item| {
                    Ok(match compile_value_expression(schema, field, item)? {
                        DbValue::Bound { parameter, .. } => parameter,
                        DbValue::Literal(function) => Value::DbFunction(function),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            return Ok(DbValue::placeholder(Value::List(parameters)));
        }
    }

    if !field_type.validate(value) {
        return Err(Error::InvalidValue(format!(
            "Invalid Value: \"{}\" for Field: {} (Type: {})",
            value, field, field_type
        )));
    }

    if field_type.is_counter() {
        let delta = value
            .as_i64()
            .and_then(|d| d.checked_abs().map(|abs| (d, abs)))
            .ok_or_else(|| Error::InvalidValue(format!("Invalid counter delta \"{}\" for Field: {}", value, field)))?;
        let sign = if delta.0 >= 0 { '+' } else { '-' };
        return Ok(DbValue::Bound {
            segment: format!("\"{}\" {} ?", field, sign),
            parameter: Value::Int(delta.1),
        });
    }

    Ok(DbValue::placeholder(value.clone()))
}

/// In-place collection update operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOperator {
    Add,
    Append,
    Prepend,
    Replace,
    Remove,
}

impl UpdateOperator {
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "$add" => Some(UpdateOperator::Add),
            "$append" => Some(UpdateOperator::Append),
            "$prepend" => Some(UpdateOperator::Prepend),
            "$replace" => Some(UpdateOperator::Replace),
            "$remove" => Some(UpdateOperator::Remove),
            _ => None,
        }
    }
}

impl fmt::Display for UpdateOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdateOperator::Add => "$add",
            UpdateOperator::Append => "$append",
            UpdateOperator::Prepend => "$prepend",
            UpdateOperator::Replace => "$replace",
            UpdateOperator::Remove => "$remove",
        };
        f.write_str(name)
    }
}

/// Split `{"$op": operand}` into its operator and operand
fn split_update_operator(value: &Value) -> (Option<UpdateOperator>, &Value) {
    if let Value::Map(map) = value {
        if map.len() == 1 {
            if let Some((key, operand)) = map.first() {
                if let Some(operator) = UpdateOperator::parse(key) {
                    return (Some(operator), operand);
                }
            }
        }
    }
    (None, value)
}

/// Compile one `SET` assignment, appending to `clauses` and `params`
pub fn compile_update_expression(
    schema: &ModelSchema,
    field: &str,
    value: &Value,
    clauses: &mut Vec<String>,
    params: &mut Vec<Value>,
) -> Result<()> {
    let (operator, operand) = split_update_operator(value);

    let (mut segment, mut parameter) = match compile_value_expression(schema, field, operand)? {
        DbValue::Literal(text) => {
            clauses.push(format!("\"{}\" = {}", field, text));
            return Ok(());
        }
        DbValue::Bound { segment, parameter } => (segment, parameter),
    };

    let operator = match operator {
        Some(operator) => operator,
        None => {
            clauses.push(format!("\"{}\" = {}", field, segment));
            params.push(parameter);
            return Ok(());
        }
    };

    let field_type = field_type(schema, field)?;
    if !field_type.is_collection() {
        return match operator {
            UpdateOperator::Replace => Err(Error::InvalidReplaceOp(format!(
                "{} datatypes does not support $replace",
                field_type
            ))),
            UpdateOperator::Prepend => Err(Error::InvalidPrependOp(format!(
                "{} datatypes does not support $prepend",
                field_type
            ))),
            other => Err(Error::InvalidOperator(format!(
                "{} is not supported on {} field \"{}\"",
                other, field_type, field
            ))),
        };
    }

    match operator {
        UpdateOperator::Add | UpdateOperator::Append => {
            segment = format!("\"{}\" + {}", field, segment);
        }
        UpdateOperator::Prepend => {
            if field_type != CqlType::List {
                return Err(Error::InvalidPrependOp(format!(
                    "{} datatypes does not support $prepend, use $add instead",
                    field_type
                )));
            }
            segment = format!("{} + \"{}\"", segment, field);
        }
        UpdateOperator::Remove => {
            segment = format!("\"{}\" - {}", field, segment);
            if let Value::Map(map) = &parameter {
                parameter = Value::List(map.keys().map(|k| Value::Text(k.clone())).collect());
            }
        }
        UpdateOperator::Replace => {
            let (index, replacement) = match (&field_type, parameter) {
                (CqlType::Map, Value::Map(map)) if map.len() == 1 => {
                    let (key, value) = map.into_iter().next().ok_or_else(|| {
                        Error::InvalidReplaceOp("$replace in map requires exactly one item".to_string())
                    })?;
                    (Value::Text(key), value)
                }
                (CqlType::Map, _) => {
                    return Err(Error::InvalidReplaceOp(
                        "$replace in map requires exactly one item".to_string(),
                    ))
                }
                (CqlType::List, parameter) => {
                    let pair = match parameter {
                        Value::List(items) => <[Value; 2]>::try_from(items).ok(),
                        _ => None,
                    };
                    match pair {
                        Some([index, value]) => (index, value),
                        None => {
                            return Err(Error::InvalidReplaceOp(
                                "$replace in list should have exactly 2 items, first one as the index and the second one as the value"
                                    .to_string(),
                            ))
                        }
                    }
                }
                (other, _) => {
                    return Err(Error::InvalidReplaceOp(format!(
                        "{} datatypes does not support $replace",
                        other
                    )))
                }
            };
            clauses.push(format!("\"{}\"[?] = {}", field, segment));
            params.push(index);
            params.push(replacement);
            return Ok(());
        }
    }

    clauses.push(format!("\"{}\" = {}", field, segment));
    params.push(parameter);
    Ok(())
}

/// Compiled `SET` list of an update statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateExpression {
    pub clauses: Vec<String>,
    pub params: Vec<Value>,
}

/// Compiled column/value lists of an insert statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveExpression {
    pub identifiers: Vec<String>,
    pub values: Vec<String>,
    pub params: Vec<Value>,
}

/// Compile the `SET` list of an update.
///
/// Unknown and virtual fields are skipped. The updated-at timestamp and the
/// version key are filled with database functions unless given explicitly.
pub fn compile_update_values(schema: &ModelSchema, update: &QueryObject) -> Result<UpdateExpression> {
    let mut update = update.clone();
    if let Some(timestamps) = &schema.options.timestamps {
        update
            .entry(timestamps.updated_at.clone())
            .or_insert_with(|| Value::DbFunction("toTimestamp(now())".to_string()));
    }
    if let Some(versions) = &schema.options.versions {
        update
            .entry(versions.key.clone())
            .or_insert_with(|| Value::DbFunction("now()".to_string()));
    }

    let mut expression = UpdateExpression::default();
    for (field, value) in &update {
        let def = match schema.field(field) {
            Some(def) => def,
            None => continue,
        };
        let value = match resolve_value("update", schema, field, def, Some(value))? {
            Some(value) => value,
            None => continue,
        };
        compile_update_expression(schema, field, &value, &mut expression.clauses, &mut expression.params)?;
    }

    Ok(expression)
}

/// Compile the column and value lists of an insert, in field declaration order
pub fn compile_save_expression(schema: &ModelSchema, values: &QueryObject) -> Result<SaveExpression> {
    let mut values = values.clone();
    if let Some(timestamps) = &schema.options.timestamps {
        values.insert(
            timestamps.updated_at.clone(),
            Value::DbFunction("toTimestamp(now())".to_string()),
        );
        values
            .entry(timestamps.created_at.clone())
            .or_insert_with(|| Value::DbFunction("toTimestamp(now())".to_string()));
    }
    if let Some(versions) = &schema.options.versions {
        values.insert(versions.key.clone(), Value::DbFunction("now()".to_string()));
    }

    let mut expression = SaveExpression::default();
    for (field, def) in schema.persisted_fields() {
        let value = match resolve_value("save", schema, field, def, values.get(field))? {
            Some(value) => value,
            None => continue,
        };

        expression.identifiers.push(format!("\"{}\"", field));
        match compile_value_expression(schema, field, &value)? {
            DbValue::Bound { segment, parameter } => {
                expression.values.push(segment);
                expression.params.push(parameter);
            }
            DbValue::Literal(text) => expression.values.push(text),
        }
    }

    Ok(expression)
}

/// Resolve the value to write for a field, applying defaults and unset rules.
///
/// Returns `None` when the field has neither a value nor a default.
fn resolve_value(
    operation: &str,
    schema: &ModelSchema,
    field: &str,
    def: &FieldDef,
    provided: Option<&Value>,
) -> Result<Option<Value>> {
    let value = match provided {
        Some(value) => value.clone(),
        None => match &def.default {
            Some(default) => {
                let default = Value::from(default);
                let ignore_default = def.rule.as_ref().map_or(false, |r| r.ignore_default);
                let field_type = normalize_type(&def.field_type);
                if !ignore_default && !field_type.validate(&default) {
                    return Err(Error::InvalidDefaultValue(format!(
                        "\"{}\" for Field: {} (Type: {})",
                        default, field, field_type
                    )));
                }
                default
            }
            None => {
                ensure_unset_allowed(operation, schema, field)?;
                return Ok(None);
            }
        },
    };

    if value.is_null_or_unset() {
        ensure_unset_allowed(operation, schema, field)?;
    }

    Ok(Some(value))
}

/// Primary key and required fields may never be written as null or unset
pub fn ensure_unset_allowed(operation: &str, schema: &ModelSchema, field: &str) -> Result<()> {
    let reason = if schema.key.contains(field) {
        "primary key"
    } else if schema.is_required(field) {
        "required"
    } else {
        return Ok(());
    };

    Err(Error::UnsetNotAllowed {
        operation: operation.to_string(),
        field: field.to_string(),
        reason: reason.to_string(),
    })
}
