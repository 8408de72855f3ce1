mod common;

use common::*;
use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use serde_json::json;

use cql_sync::db::executor::SchemaExecutor;
use cql_sync::config::{AggregateDefinition, FunctionDefinition};
use cql_sync::schema::keyspace::{FunctionReconciler, KeyspaceReconciler, UdtReconciler};
use cql_sync::{Error, SchemaAnalyzer};

fn replication(factor: i64) -> IndexMap<String, serde_json::Value> {
    let mut replication = IndexMap::new();
    replication.insert("class".to_string(), json!("SimpleStrategy"));
    replication.insert("replication_factor".to_string(), json!(factor));
    replication
}

fn keyspace_reconciler(driver: &std::sync::Arc<MockDriver>) -> KeyspaceReconciler {
    KeyspaceReconciler::new(
        SchemaAnalyzer::new(driver.clone(), KEYSPACE),
        SchemaExecutor::new(driver.clone(), false),
    )
}

fn udt_reconciler(driver: &std::sync::Arc<MockDriver>) -> UdtReconciler {
    UdtReconciler::new(
        SchemaAnalyzer::new(driver.clone(), KEYSPACE),
        SchemaExecutor::new(driver.clone(), false),
    )
}

fn function_reconciler(driver: &std::sync::Arc<MockDriver>) -> FunctionReconciler {
    FunctionReconciler::new(
        SchemaAnalyzer::new(driver.clone(), KEYSPACE),
        SchemaExecutor::new(driver.clone(), false),
    )
}

fn add_score() -> IndexMap<String, FunctionDefinition> {
    let mut inputs = IndexMap::new();
    inputs.insert("state".to_string(), "int".to_string());
    inputs.insert("value".to_string(), "int".to_string());

    let mut functions = IndexMap::new();
    functions.insert(
        "add_score".to_string(),
        FunctionDefinition {
            language: "java".to_string(),
            code: "return state + value;".to_string(),
            return_type: "int".to_string(),
            inputs,
        },
    );
    functions
}

fn total_score() -> IndexMap<String, AggregateDefinition> {
    let mut aggregates = IndexMap::new();
    aggregates.insert(
        "total_score".to_string(),
        AggregateDefinition {
            input_types: vec!["int".to_string()],
            sfunc: "add_score".to_string(),
            stype: "int".to_string(),
            finalfunc: None,
            initcond: Some("0".to_string()),
        },
    );
    aggregates
}

fn address_type() -> IndexMap<String, IndexMap<String, String>> {
    let mut fields = IndexMap::new();
    fields.insert("street".to_string(), "text".to_string());
    fields.insert("zip".to_string(), "int".to_string());

    let mut types = IndexMap::new();
    types.insert("address".to_string(), fields);
    types
}

#[tokio::test]
async fn test_missing_keyspace_is_created() {
    let driver = MockDriver::new();

    let changed = keyspace_reconciler(&driver).reconcile(&replication(1)).await.unwrap();

    assert!(changed);
    assert_eq!(
        driver.statements(),
        vec![
            "CREATE KEYSPACE IF NOT EXISTS \"app\" WITH REPLICATION = \
             {'class': 'SimpleStrategy', 'replication_factor': '1'};"
                .to_string()
        ]
    );
}

#[tokio::test]
async fn test_matching_keyspace_is_left_alone() {
    let driver = MockDriver::new();
    driver.set_keyspace(&[
        ("class", "org.apache.cassandra.locator.SimpleStrategy"),
        ("replication_factor", "1"),
    ]);

    let changed = keyspace_reconciler(&driver).reconcile(&replication(1)).await.unwrap();

    assert!(!changed);
    assert!(driver.statements().is_empty());
}

#[tokio::test]
async fn test_replication_change_alters_keyspace() {
    let driver = MockDriver::new();
    driver.set_keyspace(&[
        ("class", "org.apache.cassandra.locator.SimpleStrategy"),
        ("replication_factor", "1"),
    ]);

    let changed = keyspace_reconciler(&driver).reconcile(&replication(3)).await.unwrap();

    assert!(changed);
    assert_eq!(
        driver.statements(),
        vec![
            "ALTER KEYSPACE \"app\" WITH REPLICATION = {'class': 'SimpleStrategy', 'replication_factor': '3'};"
                .to_string()
        ]
    );
}

#[tokio::test]
async fn test_keyspace_failure_is_wrapped() {
    let driver = MockDriver::new();
    driver.fail_on("CREATE KEYSPACE");

    let result = keyspace_reconciler(&driver).reconcile(&replication(1)).await;
    assert!(matches!(result, Err(Error::KeyspaceError(_))));
}

#[tokio::test]
async fn test_missing_type_is_created() {
    let driver = MockDriver::new();

    let created = udt_reconciler(&driver).reconcile(&address_type()).await.unwrap();

    assert_eq!(created, 1);
    assert_eq!(
        driver.statements(),
        vec!["CREATE TYPE IF NOT EXISTS \"address\" (\"street\" text,\"zip\" int);".to_string()]
    );
}

#[tokio::test]
async fn test_matching_type_is_left_alone() {
    let driver = MockDriver::new();
    driver.add_type("address", &[("zip", "int"), ("street", "text")]);

    let created = udt_reconciler(&driver).reconcile(&address_type()).await.unwrap();

    assert_eq!(created, 0);
    assert!(driver.statements().is_empty());
}

#[tokio::test]
async fn test_differing_type_is_an_error() {
    let driver = MockDriver::new();
    driver.add_type("address", &[("street", "text"), ("zip", "text")]);

    let result = udt_reconciler(&driver).reconcile(&address_type()).await;

    assert!(matches!(result, Err(Error::UserDefinedTypeError(_))));
    assert!(driver.statements().is_empty());
}

#[tokio::test]
async fn test_missing_function_is_created() {
    let driver = MockDriver::new();

    let created = function_reconciler(&driver).reconcile_functions(&add_score()).await.unwrap();

    assert_eq!(created, 1);
    assert_eq!(
        driver.statements(),
        vec![
            "CREATE OR REPLACE FUNCTION \"add_score\" (\"state\" int,\"value\" int) \
             CALLED ON NULL INPUT RETURNS int LANGUAGE java AS 'return state + value;';"
                .to_string()
        ]
    );
}

#[tokio::test]
async fn test_matching_function_is_left_alone() {
    let driver = MockDriver::new();
    driver.add_function(
        "add_score",
        "java",
        "return state + value;",
        "int",
        &[("state", "int"), ("value", "int")],
    );

    let created = function_reconciler(&driver).reconcile_functions(&add_score()).await.unwrap();

    assert_eq!(created, 0);
    assert!(driver.statements().is_empty());
}

#[tokio::test]
async fn test_changed_function_body_is_replaced() {
    let driver = MockDriver::new();
    driver.add_function(
        "add_score",
        "java",
        "return state;",
        "int",
        &[("state", "int"), ("value", "int")],
    );

    let created = function_reconciler(&driver).reconcile_functions(&add_score()).await.unwrap();

    assert_eq!(created, 1);
    assert_eq!(driver.statements_starting_with("CREATE OR REPLACE FUNCTION").len(), 1);
}

#[tokio::test]
async fn test_incomplete_function_is_rejected() {
    let driver = MockDriver::new();
    let mut functions = add_score();
    functions["add_score"].code = "  ".to_string();

    let result = function_reconciler(&driver).reconcile_functions(&functions).await;

    assert!(matches!(result, Err(Error::UserDefinedFunctionError(message)) if message.contains("code")));
    assert!(driver.statements().is_empty());
}

#[tokio::test]
async fn test_missing_aggregate_is_created() {
    let driver = MockDriver::new();

    let created = function_reconciler(&driver)
        .reconcile_aggregates(&total_score())
        .await
        .unwrap();

    assert_eq!(created, 1);
    assert_eq!(
        driver.statements(),
        vec!["CREATE OR REPLACE AGGREGATE \"total_score\" (int) SFUNC \"add_score\" STYPE int INITCOND 0;".to_string()]
    );
}

#[tokio::test]
async fn test_any_matching_aggregate_overload_is_enough() {
    let driver = MockDriver::new();
    driver.add_aggregate("total_score", &["bigint"], "add_big_score", "bigint", None, Some("0"));
    driver.add_aggregate("total_score", &["int"], "add_score", "int", None, Some(" 0 "));

    let created = function_reconciler(&driver)
        .reconcile_aggregates(&total_score())
        .await
        .unwrap();

    assert_eq!(created, 0);
    assert!(driver.statements().is_empty());
}

#[tokio::test]
async fn test_aggregate_failure_is_wrapped() {
    let driver = MockDriver::new();
    driver.fail_on("CREATE OR REPLACE AGGREGATE");

    let result = function_reconciler(&driver).reconcile_aggregates(&total_score()).await;

    assert!(matches!(result, Err(Error::UserDefinedAggregateError(_))));
}
