mod common;

use common::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::fs;
use tempfile::tempdir;

use cql_sync::{Config, CqlSyncClient, Error, ModelSchema, ReconcileOutcome};

fn config(extra: &str) -> Config {
    let text = format!(
        r#"
[connection]
keyspace = "app"

[migrations]
mode = "alter"
disable_tty_confirmation = true

{}
"#,
        extra
    );
    toml::from_str(&text).unwrap()
}

fn accounts_schema() -> ModelSchema {
    serde_json::from_value(json!({
        "fields": { "id": "uuid", "email": "text" },
        "key": ["id"]
    }))
    .unwrap()
}

#[tokio::test]
async fn test_sync_database_reconciles_every_model() {
    let driver = MockDriver::with_table("account", &accounts_schema());
    let mut client = CqlSyncClient::new(config(""), driver.clone());
    client.register_model("Account", accounts_schema()).unwrap();
    client.register_model("Event", events_schema()).unwrap();

    let outcomes = client.sync_database().await.unwrap();

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].table, "account");
    assert_eq!(outcomes[0].outcome, ReconcileOutcome::Unchanged);
    assert!(!outcomes[0].changed);
    assert_eq!(outcomes[1].table, "event");
    assert_eq!(outcomes[1].outcome, ReconcileOutcome::Created);
    assert!(driver
        .statements()
        .iter()
        .all(|s| !s.contains("\"account\"")));
}

#[tokio::test]
async fn test_sync_database_asserts_keyspace_types_and_functions_first() {
    let driver = MockDriver::new();
    let mut client = CqlSyncClient::new(
        config(
            r#"
[keyspace]
create_keyspace = true

[udts.address]
street = "text"
zip = "int"

[udfs.add_score]
language = "java"
code = "return state + value;"
return_type = "int"
inputs = { state = "int", value = "int" }

[udas.total_score]
input_types = ["int"]
sfunc = "add_score"
stype = "int"
initcond = "0"
"#,
        ),
        driver.clone(),
    );
    client.register_model("Account", accounts_schema()).unwrap();

    client.sync_database().await.unwrap();

    let statements = driver.statements();
    assert!(statements[0].starts_with("CREATE KEYSPACE IF NOT EXISTS \"app\""));
    assert!(statements[1].starts_with("CREATE TYPE IF NOT EXISTS \"address\""));
    assert!(statements[2].starts_with("CREATE OR REPLACE FUNCTION \"add_score\""));
    assert!(statements[3].starts_with("CREATE OR REPLACE AGGREGATE \"total_score\""));
    assert!(statements[4].starts_with("CREATE TABLE IF NOT EXISTS \"account\""));
}

#[tokio::test]
async fn test_sync_model_uses_configured_confirmation() {
    let driver = MockDriver::with_table("account", &accounts_schema());
    let confirmation = ScriptedConfirmation::new(&[false]);
    let mut client = CqlSyncClient::new(config(""), driver.clone()).with_confirmation(confirmation.clone());

    let mut declared = accounts_schema();
    declared.fields.shift_remove("email");
    client.register_model("Account", declared).unwrap();

    let result = client.sync_model("Account").await;

    assert!(matches!(result, Err(Error::SchemaMismatch { .. })));
    assert_eq!(confirmation.prompts().len(), 1);
    assert!(driver.statements().is_empty());
}

#[tokio::test]
async fn test_sync_unknown_model() {
    let client = CqlSyncClient::new(config(""), MockDriver::new());
    assert!(matches!(
        client.sync_model("Missing").await,
        Err(Error::ModelRegistrationError(_))
    ));
}

#[tokio::test]
async fn test_init_scans_models() {
    let dir = tempdir().unwrap();
    let models = dir.path().join("models");
    fs::create_dir(&models).unwrap();
    fs::write(
        models.join("Account.json"),
        r#"{ "fields": { "id": "uuid", "email": "text" }, "key": ["id"] }"#,
    )
    .unwrap();

    let config_path = dir.path().join("cql_sync.toml");
    fs::write(
        &config_path,
        format!(
            "[connection]\nkeyspace = \"app\"\n\n[models]\npaths = [{:?}]\n",
            models.to_string_lossy()
        ),
    )
    .unwrap();

    let client = cql_sync::init(&config_path.to_string_lossy(), MockDriver::new())
        .await
        .unwrap();

    assert_eq!(client.registry().len(), 1);
    assert_eq!(client.registry().get("Account").unwrap().table_name, "account");
}
