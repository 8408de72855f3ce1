//! Naming utilities for cql_sync
//!
//! This module provides identifier conventions: table names derived from
//! model names, reserved keyword checks, and identifier quoting.

use inflector::Inflector;
use once_cell::sync::Lazy;
use regex::Regex;

/// Keywords that must stay quoted when used as identifiers
const RESERVED_KEYWORDS: &[&str] = &[
    "ADD", "AGGREGATE", "ALLOW", "ALTER", "AND", "ANY", "APPLY", "ASC", "AUTHORIZE", "BATCH",
    "BEGIN", "BY", "COLUMNFAMILY", "CREATE", "DELETE", "DESC", "DROP", "EACH_QUORUM", "ENTRIES",
    "FROM", "FULL", "GRANT", "IF", "IN", "INDEX", "INET", "INFINITY", "INSERT", "INTO",
    "KEYSPACE", "KEYSPACES", "LIMIT", "LOCAL_ONE", "LOCAL_QUORUM", "MATERIALIZED", "MODIFY",
    "NAN", "NORECURSIVE", "NOT", "OF", "ON", "ONE", "ORDER", "PARTITION", "PASSWORD", "PER",
    "PRIMARY", "QUORUM", "RENAME", "REVOKE", "SCHEMA", "SELECT", "SET", "TABLE", "TIME", "THREE",
    "TO", "TOKEN", "TRUNCATE", "TWO", "UNLOGGED", "UPDATE", "USE", "USING", "VIEW", "WHERE",
    "WITH",
];

static TABLE_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_0-9]{1,48}$").expect("valid table name pattern"));

/// A single-quoted string literal, or a double-quoted identifier (captured)
static QUOTED_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"'(?:[^']|'')*'|"([^"]*)""#).expect("valid identifier pattern"));

/// Get table name from a model name
pub fn get_table_name(model_name: &str) -> String {
    model_name.to_snake_case()
}

/// Check whether a table name is acceptable to the cluster
pub fn is_valid_table_name(name: &str) -> bool {
    TABLE_NAME_PATTERN.is_match(name)
}

/// Check if a word is a reserved CQL keyword
pub fn is_reserved_keyword(word: &str) -> bool {
    RESERVED_KEYWORDS.contains(&word.to_uppercase().as_str())
}

/// Double-quote an identifier
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name)
}

/// Remove quotes from identifiers that do not need them.
///
/// The catalog reports generated clauses with lower-case, non-reserved
/// identifiers unquoted, so clauses we generate are rewritten the same way
/// before comparison. String literals are left untouched.
pub fn unquote_identifiers(clause: &str) -> String {
    QUOTED_SPAN
        .replace_all(clause, |caps: &regex::Captures| match caps.get(1) {
            Some(name) if name.as_str() == name.as_str().to_lowercase() && !is_reserved_keyword(name.as_str()) => {
                name.as_str().to_string()
            }
            _ => caps[0].to_string(),
        })
        .into_owned()
}

/// Strip double quotes and whitespace from an identifier or index target
pub fn strip_quotes_and_whitespace(target: &str) -> String {
    target
        .chars()
        .filter(|c| *c != '"' && !c.is_whitespace())
        .collect()
}
