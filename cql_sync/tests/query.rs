use pretty_assertions::assert_eq;
use serde_json::json;

use cql_sync::query::{
    build_delete, build_find, build_insert, build_update, compile_filter_expression, query_object, FindOptions,
    InsertOptions, UpdateOptions,
};
use cql_sync::{Error, ModelSchema, Value};

fn users() -> ModelSchema {
    serde_json::from_value(json!({
        "fields": {
            "id": "int",
            "name": "text",
            "age": "int",
            "tags": "set<text>",
            "scores": "map<text, int>",
            "visits": "counter"
        },
        "key": ["id"]
    }))
    .unwrap()
}

fn q(value: serde_json::Value) -> cql_sync::query::QueryObject {
    query_object(value).unwrap()
}

#[test]
fn test_filter_relations_in_input_order() {
    let expression = compile_filter_expression(&users(), &q(json!({ "age": { "$gte": 21 }, "name": "Alice" }))).unwrap();

    assert_eq!(expression.clauses, vec!["\"age\" >= ?", "\"name\" = ?"]);
    assert_eq!(expression.params, vec![Value::Int(21), Value::from("Alice")]);
}

#[test]
fn test_contains_key_requires_map() {
    let result = compile_filter_expression(&users(), &q(json!({ "tags": { "$contains_key": "x" } })));
    assert!(matches!(result, Err(Error::InvalidContainsKeyOp(_))));

    let expression = compile_filter_expression(&users(), &q(json!({ "scores": { "$contains_key": "math" } }))).unwrap();
    assert_eq!(expression.clauses, vec!["\"scores\" CONTAINS KEY ?"]);
}

#[test]
fn test_find_with_directives() {
    let statement = build_find(
        &users(),
        "users",
        &q(json!({
            "age": { "$gt": 30 },
            "$orderby": { "$desc": "age" },
            "$limit": 10
        })),
        &FindOptions {
            select: vec!["name".to_string(), "age".to_string()],
            allow_filtering: true,
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(
        statement.query,
        "SELECT \"name\",\"age\" FROM \"users\" WHERE \"age\" > ? ORDER BY \"age\" DESC LIMIT 10 ALLOW FILTERING;"
    );
    assert_eq!(statement.params, vec![Value::Int(30)]);
}

#[test]
fn test_update_collection_add() {
    let statement = build_update(
        &users(),
        "users",
        &q(json!({ "id": 1 })),
        &q(json!({ "tags": { "$add": ["x"] } })),
        &UpdateOptions::default(),
    )
    .unwrap();

    assert_eq!(statement.query, "UPDATE \"users\" SET \"tags\" = \"tags\" + ? WHERE \"id\" = ?;");
    assert_eq!(statement.params, vec![Value::from(vec!["x"]), Value::Int(1)]);
}

#[test]
fn test_update_counter_decrement() {
    let statement = build_update(
        &users(),
        "users",
        &q(json!({ "id": 1 })),
        &q(json!({ "visits": -3 })),
        &UpdateOptions::default(),
    )
    .unwrap();

    assert_eq!(statement.query, "UPDATE \"users\" SET \"visits\" = \"visits\" - ? WHERE \"id\" = ?;");
    assert_eq!(statement.params, vec![Value::Int(3), Value::Int(1)]);
}

#[test]
fn test_update_with_ttl_and_condition() {
    let statement = build_update(
        &users(),
        "users",
        &q(json!({ "id": 1 })),
        &q(json!({ "name": "Bob" })),
        &UpdateOptions {
            ttl: Some(60),
            conditions: Some(q(json!({ "age": 40 }))),
            if_exists: false,
        },
    )
    .unwrap();

    assert_eq!(
        statement.query,
        "UPDATE \"users\" USING TTL ? SET \"name\" = ? WHERE \"id\" = ? IF \"age\" = ?;"
    );
    assert_eq!(
        statement.params,
        vec![Value::Int(60), Value::from("Bob"), Value::Int(1), Value::Int(40)]
    );
}

#[test]
fn test_insert_rejects_missing_key() {
    let result = build_insert(&users(), "users", &q(json!({ "name": "Carol" })), &InsertOptions::default());
    assert!(matches!(result, Err(Error::UnsetNotAllowed { field, .. }) if field == "id"));
}

#[test]
fn test_insert_if_not_exists() {
    let statement = build_insert(
        &users(),
        "users",
        &q(json!({ "id": 7, "name": "Dana" })),
        &InsertOptions {
            ttl: None,
            if_not_exists: true,
        },
    )
    .unwrap();

    assert_eq!(
        statement.query,
        "INSERT INTO \"users\" ( \"id\" , \"name\" ) VALUES ( ? , ? ) IF NOT EXISTS;"
    );
    assert_eq!(statement.params, vec![Value::Int(7), Value::from("Dana")]);
}

#[test]
fn test_delete_requires_where() {
    let result = build_delete(&users(), "users", &q(json!({})));
    assert!(matches!(result, Err(Error::InvalidValue(_))));
}
