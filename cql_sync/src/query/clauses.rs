//! Directive clauses
//!
//! Single-purpose compilers for `$orderby`, `$groupby`, `$limit` /
//! `$per_partition_limit` and select lists.

use crate::error::{Error, Result};
use crate::query::QueryObject;
use crate::value::Value;

/// Compile `$orderby` into `ORDER BY "a" ASC, "b" DESC`
pub fn compile_order_by(query: &QueryObject) -> Result<String> {
    let mut order_keys = Vec::new();

    for (key, item) in query {
        if key.to_lowercase() != "$orderby" {
            continue;
        }

        let directions = item
            .as_map()
            .ok_or_else(|| Error::InvalidOrder("$orderby must be an object".to_string()))?;

        for (direction, fields) in directions {
            let direction = match direction.to_lowercase().as_str() {
                "$asc" => "ASC",
                "$desc" => "DESC",
                _ => return Err(Error::InvalidOrder(format!("invalid order type: {}", direction))),
            };

            for field in field_names(fields).map_err(Error::InvalidOrder)? {
                order_keys.push(format!("\"{}\" {}", field, direction));
            }
        }
    }

    Ok(if order_keys.is_empty() {
        String::new()
    } else {
        format!("ORDER BY {}", order_keys.join(", "))
    })
}

/// Compile `$groupby` into `GROUP BY "a", "b"`
pub fn compile_group_by(query: &QueryObject) -> Result<String> {
    let mut group_keys = Vec::new();

    for (key, item) in query {
        if key.to_lowercase() != "$groupby" {
            continue;
        }
        if !matches!(item, Value::List(_)) {
            return Err(Error::InvalidGroup("$groupby must be an array".to_string()));
        }
        for field in field_names(item).map_err(Error::InvalidGroup)? {
            group_keys.push(format!("\"{}\"", field));
        }
    }

    Ok(if group_keys.is_empty() {
        String::new()
    } else {
        format!("GROUP BY {}", group_keys.join(", "))
    })
}

/// Compile `$per_partition_limit` and `$limit`
pub fn compile_limit(query: &QueryObject) -> Result<String> {
    let mut per_partition = None;
    let mut limit = None;

    for (key, item) in query {
        let slot = match key.to_lowercase().as_str() {
            "$limit" => &mut limit,
            "$per_partition_limit" => &mut per_partition,
            _ => continue,
        };
        let value = item
            .as_i64()
            .filter(|n| *n >= 0)
            .ok_or_else(|| Error::InvalidLimit(format!("{} must be a non-negative integer", key)))?;
        *slot = Some(value);
    }

    let mut parts = Vec::new();
    if let Some(n) = per_partition {
        parts.push(format!("PER PARTITION LIMIT {}", n));
    }
    if let Some(n) = limit {
        parts.push(format!("LIMIT {}", n));
    }
    Ok(parts.join(" "))
}

/// Compile a select list; an empty list selects `*`
pub fn compile_select(select: &[String]) -> String {
    if select.is_empty() {
        return "*".to_string();
    }

    select
        .iter()
        .map(|item| compile_selection(item))
        .collect::<Vec<_>>()
        .join(",")
}

/// One select item: `col`, `fn(col)`, `fn(a, b)`, optionally followed by `AS alias`
fn compile_selection(item: &str) -> String {
    let parts: Vec<&str> = item
        .split(|c| matches!(c, '(' | ',' | ' ' | ')'))
        .filter(|p| !p.is_empty())
        .collect();

    let has_alias = parts.len() >= 3 && parts[parts.len() - 2].eq_ignore_ascii_case("as");
    if has_alias {
        let (expression, alias) = parts.split_at(parts.len() - 2);
        return format!("{} AS \"{}\"", compile_call(expression), alias[1]);
    }

    compile_call(&parts)
}

fn compile_call(parts: &[&str]) -> String {
    match parts {
        [] => String::new(),
        ["*"] => "*".to_string(),
        [column] => format!("\"{}\"", column),
        [function, args @ ..] => format!("{}(\"{}\")", function, args.join("\",\"")),
    }
}

/// A single field name or a list of them
fn field_names(value: &Value) -> std::result::Result<Vec<String>, String> {
    match value {
        Value::Text(field) => Ok(vec![field.clone()]),
        Value::List(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| format!("expected a field name, got {}", item))
            })
            .collect(),
        other => Err(format!("expected a field name or list of field names, got {}", other)),
    }
}
