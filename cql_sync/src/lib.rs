//! cql_sync: declared schemas, schema reconciliation and query compilation for Cassandra
//!
//! cql_sync lets you declare table schemas (fields, primary key, indexes,
//! materialized views) and converges a live keyspace onto them, asking for
//! confirmation before anything that loses data. It also compiles structured
//! query, update and save objects into parameterized CQL.

pub mod config;
pub mod confirm;
pub mod db;
pub mod error;
pub mod models;
pub mod query;
pub mod schema;
pub mod sync;
pub mod utils;
pub mod value;

use std::sync::Arc;

// Re-export main types for easier access
pub use config::Config;
pub use confirm::{AutoConfirm, Confirmation, ConfirmationOracle, TtyConfirmation};
pub use cql_sync_macros::Record;
pub use db::connection::{DatabaseConnection, Driver, DriverError, Row};
pub use error::{Error, Result};
pub use indexmap;
pub use models::record::Record;
pub use models::registry::ModelRegistry;
pub use schema::analyzer::SchemaAnalyzer;
pub use schema::reconciler::{ReconcileOutcome, TableReconciler};
pub use schema::types::ModelSchema;
pub use sync::{GraphSync, SearchIndexSync};
pub use value::Value;

use db::executor::SchemaExecutor;
use schema::keyspace::{FunctionReconciler, KeyspaceReconciler, UdtReconciler};

/// Initialize cql_sync from a configuration file and scan for models
pub async fn init(config_path: &str, connection: DatabaseConnection) -> Result<CqlSyncClient> {
    let config = config::load_from_file(config_path)?;
    utils::logging::init_logging(&config.logging)?;

    let mut client = CqlSyncClient::new(config, connection);
    client.register_models()?;
    Ok(client)
}

/// Result of reconciling one model's table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub table: String,
    pub outcome: ReconcileOutcome,
    pub changed: bool,
}

/// The main client for interacting with cql_sync
pub struct CqlSyncClient {
    config: Config,
    connection: DatabaseConnection,
    model_registry: ModelRegistry,
    confirmation: Confirmation,
    search: Option<Arc<dyn SearchIndexSync>>,
    graph: Option<Arc<dyn GraphSync>>,
}

impl CqlSyncClient {
    /// Create a new client; the confirmation oracle follows `disable_tty_confirmation`
    pub fn new(config: Config, connection: DatabaseConnection) -> Self {
        let confirmation: Confirmation = if config.migrations.disable_tty_confirmation {
            Arc::new(AutoConfirm)
        } else {
            Arc::new(TtyConfirmation::new())
        };
        let model_registry = ModelRegistry::new(&config.models);

        Self {
            config,
            connection,
            model_registry,
            confirmation,
            search: None,
            graph: None,
        }
    }

    pub fn with_confirmation(mut self, confirmation: Confirmation) -> Self {
        self.confirmation = confirmation;
        self
    }

    pub fn with_search_sync(mut self, search: Arc<dyn SearchIndexSync>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_graph_sync(mut self, graph: Arc<dyn GraphSync>) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.model_registry
    }

    /// Register a single model schema
    pub fn register_model(&mut self, name: &str, schema: ModelSchema) -> Result<()> {
        self.model_registry.register(name, schema)?;
        Ok(())
    }

    /// Scan the configured directories for model schemas and register them
    pub fn register_models(&mut self) -> Result<usize> {
        self.model_registry.scan_and_register()
    }

    pub fn analyzer(&self) -> SchemaAnalyzer {
        SchemaAnalyzer::new(self.connection.clone(), &self.config.connection.keyspace)
    }

    fn executor(&self) -> SchemaExecutor {
        SchemaExecutor::new(self.connection.clone(), self.config.migrations.dry_run)
    }

    /// A table reconciler wired to this client's driver, oracle and sync targets
    pub fn table_reconciler(&self) -> TableReconciler {
        let mut reconciler = TableReconciler::new(
            self.analyzer(),
            self.executor(),
            self.confirmation.clone(),
            &self.config.migrations,
        );
        if let Some(search) = &self.search {
            reconciler = reconciler.with_search_sync(search.clone());
        }
        if let Some(graph) = &self.graph {
            reconciler = reconciler.with_graph_sync(graph.clone());
        }
        reconciler
    }

    /// Create the keyspace, or align its replication
    pub async fn assert_keyspace(&self) -> Result<bool> {
        KeyspaceReconciler::new(self.analyzer(), self.executor())
            .reconcile(&self.config.keyspace.replication)
            .await
    }

    /// Create the configured user defined types that do not exist yet
    pub async fn assert_udts(&self) -> Result<usize> {
        UdtReconciler::new(self.analyzer(), self.executor())
            .reconcile(&self.config.udts)
            .await
    }

    /// Create or replace the configured user defined functions that differ from the catalog
    pub async fn assert_udfs(&self) -> Result<usize> {
        FunctionReconciler::new(self.analyzer(), self.executor())
            .reconcile_functions(&self.config.udfs)
            .await
    }

    /// Create or replace the configured user defined aggregates that differ from the catalog
    pub async fn assert_udas(&self) -> Result<usize> {
        FunctionReconciler::new(self.analyzer(), self.executor())
            .reconcile_aggregates(&self.config.udas)
            .await
    }

    /// Reconcile one registered model
    pub async fn sync_model(&self, name: &str) -> Result<SyncOutcome> {
        let model = self
            .model_registry
            .get(name)
            .ok_or_else(|| Error::ModelRegistrationError(format!("Model \"{}\" is not registered", name)))?;

        let outcome = self.table_reconciler().reconcile(&model.table_name, &model.schema).await?;
        Ok(SyncOutcome {
            table: model.table_name.clone(),
            outcome,
            changed: outcome.changed(),
        })
    }

    /// Complete workflow: keyspace, user defined types, functions and
    /// aggregates, then every registered model.
    ///
    /// Tables are reconciled concurrently; the steps for one table run in order.
    pub async fn sync_database(&self) -> Result<Vec<SyncOutcome>> {
        if self.config.keyspace.create_keyspace {
            self.assert_keyspace().await?;
        }
        if !self.config.udts.is_empty() {
            self.assert_udts().await?;
        }
        if !self.config.udfs.is_empty() {
            self.assert_udfs().await?;
        }
        if !self.config.udas.is_empty() {
            self.assert_udas().await?;
        }

        let reconciler = self.table_reconciler();
        let reconciler = &reconciler;
        let passes = self.model_registry.models().map(|model| async move {
            let outcome = reconciler.reconcile(&model.table_name, &model.schema).await?;
            Ok::<_, Error>(SyncOutcome {
                table: model.table_name.clone(),
                outcome,
                changed: outcome.changed(),
            })
        });
        let outcomes = futures::future::try_join_all(passes).await?;

        let changed = outcomes.iter().filter(|o| o.changed).count();
        if changed == 0 {
            tracing::info!("Database schema is already in sync with models");
        } else {
            tracing::info!(tables = changed, "Database schema synchronized");
        }

        Ok(outcomes)
    }
}
