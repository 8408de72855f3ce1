//! Configuration handling for cql_sync

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;

use crate::error::{Error, Result};

/// Load configuration from a TOML file
pub fn load_from_file(path: &str) -> Result<Config> {
    let config_str = fs::read_to_string(path)
        .map_err(|e| Error::ConfigError(format!("Failed to read config file: {}", e)))?;

    let config: Config = toml::from_str(&config_str)
        .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))?;

    Ok(config)
}

/// Represents the complete cql_sync configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub migrations: MigrationsConfig,
    #[serde(default)]
    pub keyspace: KeyspaceConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    pub logging: Option<LoggingConfig>,
    /// User defined types: type name to field name to field type
    #[serde(default)]
    pub udts: IndexMap<String, IndexMap<String, String>>,
    /// User defined functions by name
    #[serde(default)]
    pub udfs: IndexMap<String, FunctionDefinition>,
    /// User defined aggregates by name
    #[serde(default)]
    pub udas: IndexMap<String, AggregateDefinition>,
}

/// A user defined function
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FunctionDefinition {
    pub language: String,
    pub code: String,
    pub return_type: String,
    /// Argument name to argument type, in call order
    #[serde(default)]
    pub inputs: IndexMap<String, String>,
}

/// A user defined aggregate over a state function
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AggregateDefinition {
    pub input_types: Vec<String>,
    pub sfunc: String,
    pub stype: String,
    pub finalfunc: Option<String>,
    /// Initial state as a CQL literal
    pub initcond: Option<String>,
}

/// Cluster connection configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConnectionConfig {
    pub keyspace: String,
    #[serde(default)]
    pub contact_points: Vec<String>,
}

/// How differences between declared and live schema are handled
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MigrationMode {
    /// Report any difference, never change the table
    #[default]
    Safe,
    Alter,
    Drop,
}

/// Migration settings configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MigrationsConfig {
    #[serde(default)]
    pub mode: MigrationMode,
    #[serde(default)]
    pub disable_tty_confirmation: bool,
    #[serde(default = "default_true")]
    pub create_table: bool,
    #[serde(default)]
    pub dry_run: bool,
    pub environment: Option<String>,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            mode: MigrationMode::default(),
            disable_tty_confirmation: false,
            create_table: true,
            dry_run: false,
            environment: None,
        }
    }
}

impl MigrationsConfig {
    /// Configured mode, forced to `safe` in production
    pub fn effective_mode(&self) -> MigrationMode {
        match self.environment.as_deref() {
            Some(env) if env.eq_ignore_ascii_case("production") => MigrationMode::Safe,
            _ => self.mode,
        }
    }
}

/// Keyspace creation configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct KeyspaceConfig {
    #[serde(default)]
    pub create_keyspace: bool,
    #[serde(default = "default_replication")]
    pub replication: IndexMap<String, serde_json::Value>,
}

impl Default for KeyspaceConfig {
    fn default() -> Self {
        Self {
            create_keyspace: false,
            replication: default_replication(),
        }
    }
}

fn default_replication() -> IndexMap<String, serde_json::Value> {
    let mut replication = IndexMap::new();
    replication.insert("class".to_string(), serde_json::json!("SimpleStrategy"));
    replication.insert("replication_factor".to_string(), serde_json::json!(1));
    replication
}

/// Model discovery configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ModelsConfig {
    #[serde(default)]
    pub paths: Vec<String>,
    pub exclude_paths: Option<Vec<String>>,
    #[serde(default)]
    pub recursive_scan: bool,
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    pub file: Option<String>,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_true")]
    pub stdout: bool,
}

fn default_true() -> bool {
    true
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}
