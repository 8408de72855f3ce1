//! Filter expression compiler
//!
//! This module compiles query objects such as
//! `{"age": {"$gte": 21}, "name": "Alice"}` into `WHERE`/`IF` relations
//! and their bound parameters.

use crate::error::{Error, Result};
use crate::query::expression::{compile_value_expression, field_type, DbValue};
use crate::query::QueryObject;
use crate::schema::datatypes::CqlType;
use crate::schema::types::ModelSchema;
use crate::value::{quote_literal, Value};

/// Relation operators accepted in query objects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Isnt,
    Gt,
    Lt,
    Gte,
    Lte,
    In,
    Like,
    Token,
    Contains,
    ContainsKey,
}

impl Operator {
    /// Parse an operator key, case-insensitively
    pub fn parse(key: &str) -> Option<Self> {
        let operator = match key.to_lowercase().as_str() {
            "$eq" => Operator::Eq,
            "$ne" => Operator::Ne,
            "$isnt" => Operator::Isnt,
            "$gt" => Operator::Gt,
            "$lt" => Operator::Lt,
            "$gte" => Operator::Gte,
            "$lte" => Operator::Lte,
            "$in" => Operator::In,
            "$like" => Operator::Like,
            "$token" => Operator::Token,
            "$contains" => Operator::Contains,
            "$contains_key" => Operator::ContainsKey,
            _ => return None,
        };
        Some(operator)
    }

    /// The CQL comparison token
    pub fn as_cql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Isnt => "IS NOT",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::In => "IN",
            Operator::Like => "LIKE",
            Operator::Token => "token",
            Operator::Contains => "CONTAINS",
            Operator::ContainsKey => "CONTAINS KEY",
        }
    }
}

/// Compiled relations and their parameters, in input order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterExpression {
    pub clauses: Vec<String>,
    pub params: Vec<Value>,
}

impl FilterExpression {
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Render as `<keyword> a AND b`, or an empty string when there are no relations
    pub fn render(&self, keyword: &str) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("{} {}", keyword, self.clauses.join(" AND "))
        }
    }

    fn push(&mut self, clause: String, param: Value) {
        self.clauses.push(clause);
        self.params.push(param);
    }

    fn push_db_value(&mut self, template: impl FnOnce(&str) -> String, db_value: DbValue) {
        match db_value {
            DbValue::Bound { segment, parameter } => self.push(template(&segment), parameter),
            DbValue::Literal(text) => self.clauses.push(template(&text)),
        }
    }
}

/// Compile a query object into relations
pub fn compile_filter_expression(schema: &ModelSchema, query: &QueryObject) -> Result<FilterExpression> {
    let mut expression = FilterExpression::default();

    for (field, relation) in query {
        if field.starts_with('$') {
            compile_directive(field, relation, &mut expression)?;
            continue;
        }

        let relations: Vec<&Value> = match relation {
            Value::List(items) => items.iter().collect(),
            single => vec![single],
        };

        for relation in relations {
            for (operator, value) in split_relation(relation)? {
                extract_relations(schema, field, operator, value, &mut expression)?;
            }
        }
    }

    Ok(expression)
}

/// Search directives that bypass field compilation
fn compile_directive(key: &str, value: &Value, expression: &mut FilterExpression) -> Result<()> {
    match key {
        "$expr" => {
            let index = value.as_map().and_then(|m| m.get("index")).and_then(Value::as_str);
            let query = value.as_map().and_then(|m| m.get("query")).and_then(Value::as_str);
            match (index, query) {
                (Some(index), Some(query)) => {
                    expression.clauses.push(format!("expr({},{})", index, quote_literal(query)));
                }
                _ => {
                    return Err(Error::InvalidExpr(
                        "$expr requires string \"index\" and \"query\" entries".to_string(),
                    ))
                }
            }
        }
        "$solr_query" => match value {
            Value::Text(query) => expression.clauses.push(format!("solr_query={}", quote_literal(query))),
            _ => return Err(Error::InvalidSolrQuery("$solr_query must be a string".to_string())),
        },
        // $orderby, $limit and friends belong to other clauses
        _ => {}
    }
    Ok(())
}

/// Split one relation into operator/value pairs; anything that is not an operator map is `$eq`
fn split_relation(relation: &Value) -> Result<Vec<(Operator, &Value)>> {
    match relation {
        Value::Map(map) if !map.is_empty() && map.keys().all(|k| k.starts_with('$')) => map
            .iter()
            .map(|(key, value)| {
                Operator::parse(key)
                    .map(|operator| (operator, value))
                    .ok_or_else(|| Error::InvalidOperator(key.clone()))
            })
            .collect(),
        other => Ok(vec![(Operator::Eq, other)]),
    }
}

fn extract_relations(
    schema: &ModelSchema,
    field: &str,
    operator: Operator,
    value: &Value,
    expression: &mut FilterExpression,
) -> Result<()> {
    match operator {
        Operator::In if !matches!(value, Value::List(_)) => {
            Err(Error::InvalidInOp(format!("$in on \"{}\" must be an array", field)))
        }
        Operator::Token => extract_token_relations(schema, field, value, expression),
        Operator::Contains => {
            let field_type = field_type(schema, field)?;
            if !field_type.is_collection() && field_type != CqlType::Frozen {
                return Err(Error::InvalidContainsOp(format!(
                    "\"{}\" is of type {}, $contains requires a list, set, map or frozen field",
                    field, field_type
                )));
            }
            match (field_type, value) {
                (CqlType::Map, Value::Map(entries)) => {
                    for (key, entry) in entries {
                        expression.push(format!("\"{}\"[?] = ?", field), Value::Text(key.clone()));
                        expression.params.push(entry.clone());
                    }
                }
                _ => expression.push(format!("\"{}\" CONTAINS ?", field), value.clone()),
            }
            Ok(())
        }
        Operator::ContainsKey => {
            let field_type = field_type(schema, field)?;
            if field_type != CqlType::Map {
                return Err(Error::InvalidContainsKeyOp(format!(
                    "\"{}\" is of type {}, $contains_key requires a map field",
                    field, field_type
                )));
            }
            expression.push(format!("\"{}\" CONTAINS KEY ?", field), value.clone());
            Ok(())
        }
        operator => {
            let db_value = compile_value_expression(schema, field, value)?;
            expression.push_db_value(|segment| format!("\"{}\" {} {}", field, operator.as_cql(), segment), db_value);
            Ok(())
        }
    }
}

/// `token("k1","k2") OP token(?,?)` relations over a (possibly composite) key
fn extract_token_relations(
    schema: &ModelSchema,
    field: &str,
    value: &Value,
    expression: &mut FilterExpression,
) -> Result<()> {
    let relations = value
        .as_map()
        .ok_or_else(|| Error::InvalidTokenOp("$token must be an object".to_string()))?;

    for (key, relation_value) in relations {
        let operator = match Operator::parse(key) {
            Some(Operator::Token) | Some(Operator::In) | None => {
                return Err(Error::InvalidTokenOp(format!("invalid operator {} in $token", key)))
            }
            Some(operator) => operator,
        };

        match relation_value {
            Value::List(values) => {
                let keys: Vec<&str> = field.split(',').map(str::trim).collect();
                if keys.len() != values.len() {
                    return Err(Error::InvalidTokenOp(format!(
                        "$token on \"{}\" expects {} values, got {}",
                        field,
                        keys.len(),
                        values.len()
                    )));
                }

                let mut segments = Vec::with_capacity(values.len());
                for (key, value) in keys.iter().zip(values) {
                    match compile_value_expression(schema, key, value)? {
                        DbValue::Bound { segment, parameter } => {
                            segments.push(segment);
                            expression.params.push(parameter);
                        }
                        DbValue::Literal(text) => segments.push(text),
                    }
                }
                expression.clauses.push(format!(
                    "token(\"{}\") {} token({})",
                    keys.join("\",\""),
                    operator.as_cql(),
                    segments.join(",")
                ));
            }
            single => {
                let db_value = compile_value_expression(schema, field, single)?;
                expression.push_db_value(
                    |segment| format!("token(\"{}\") {} token({})", field, operator.as_cql(), segment),
                    db_value,
                );
            }
        }
    }
    Ok(())
}

/// `WHERE` clause text and parameters
pub fn compile_where_clause(schema: &ModelSchema, query: &QueryObject) -> Result<(String, Vec<Value>)> {
    let expression = compile_filter_expression(schema, query)?;
    Ok((expression.render("WHERE"), expression.params))
}

/// `IF` clause text and parameters for conditional updates
pub fn compile_if_clause(schema: &ModelSchema, conditions: &QueryObject) -> Result<(String, Vec<Value>)> {
    let expression = compile_filter_expression(schema, conditions)?;
    Ok((expression.render("IF"), expression.params))
}

/// Compile a filter with its parameters inlined as CQL literals, for use in DDL
pub fn compile_filter_ddl(schema: &ModelSchema, query: &QueryObject, keyword: &str) -> Result<String> {
    let expression = compile_filter_expression(schema, query)?;
    let rendered = expression.render(keyword);
    inline_parameters(&rendered, &expression.params)
}

/// Replace each `?` outside of string literals with the next parameter literal
fn inline_parameters(text: &str, params: &[Value]) -> Result<String> {
    let mut params = params.iter();
    let mut output = String::with_capacity(text.len());
    let mut in_literal = false;

    for c in text.chars() {
        match c {
            '\'' => {
                in_literal = !in_literal;
                output.push(c);
            }
            '?' if !in_literal => {
                let param = params
                    .next()
                    .ok_or_else(|| Error::InvalidValue(format!("missing parameter in \"{}\"", text)))?;
                output.push_str(&param.to_cql_literal());
            }
            _ => output.push(c),
        }
    }

    Ok(output)
}
