//! Table reconciler
//!
//! This module converges one live table onto its declared schema. A missing
//! table is created together with its indexes and views. A differing table
//! is either altered in place or dropped and recreated, depending on the
//! migration mode and on what changed. Every step that can lose data passes
//! through the confirmation gate first.

use std::sync::Arc;

use crate::config::{MigrationMode, MigrationsConfig};
use crate::confirm::Confirmation;
use crate::db::executor::SchemaExecutor;
use crate::error::{Error, Result};
use crate::schema::analyzer::SchemaAnalyzer;
use crate::schema::diff::{plan_alter_operations, select_migration_strategy, AlterPlan, MigrationPlan, MigrationStrategy};
use crate::schema::generator::{
    create_custom_index_statement, create_index_statement, create_view_statement, schema_creation_statements,
    Statement,
};
use crate::schema::normalizer::normalize_schema;
use crate::schema::types::{LiveSchema, ModelSchema};
use crate::sync::{search_index_name, sync_graph_mapping, sync_search_mapping, GraphSync, SearchIndexSync};

const MANUAL_HINT: &str = "migration suspended, please apply the change manually";
const SAFE_MODE_HINT: &str =
    "migration mode is safe, please apply the change manually or switch the migration mode to alter or drop";

/// What a reconciliation pass did to the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created,
    Unchanged,
    Altered,
    Recreated,
}

impl ReconcileOutcome {
    /// Whether any definition statement was issued
    pub fn changed(&self) -> bool {
        !matches!(self, ReconcileOutcome::Unchanged)
    }
}

/// Reconciles tables of one keyspace
#[derive(Clone)]
pub struct TableReconciler {
    analyzer: SchemaAnalyzer,
    executor: SchemaExecutor,
    confirmation: Confirmation,
    mode: MigrationMode,
    create_table: bool,
    search: Option<Arc<dyn SearchIndexSync>>,
    graph: Option<Arc<dyn GraphSync>>,
}

impl TableReconciler {
    pub fn new(
        analyzer: SchemaAnalyzer,
        executor: SchemaExecutor,
        confirmation: Confirmation,
        migrations: &MigrationsConfig,
    ) -> Self {
        Self {
            analyzer,
            executor,
            confirmation,
            mode: migrations.effective_mode(),
            create_table: migrations.create_table,
            search: None,
            graph: None,
        }
    }

    pub fn with_search_sync(mut self, search: Arc<dyn SearchIndexSync>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_graph_sync(mut self, graph: Arc<dyn GraphSync>) -> Self {
        self.graph = Some(graph);
        self
    }

    fn keyspace(&self) -> &str {
        self.analyzer.keyspace()
    }

    /// Converge `table` onto `schema`
    pub async fn reconcile(&self, table: &str, schema: &ModelSchema) -> Result<ReconcileOutcome> {
        tracing::info!(table = table, "Reconciling table schema");

        let outcome = match self.analyzer.analyze_table(table).await? {
            None => {
                if !self.create_table {
                    return Err(Error::SchemaNotFound(table.to_string()));
                }
                self.create(table, schema).await?;
                ReconcileOutcome::Created
            }
            Some(live) => self.migrate(table, &live, schema).await?,
        };

        self.sync_external(table, schema).await?;

        tracing::info!(table = table, outcome = ?outcome, "Table schema reconciled");
        Ok(outcome)
    }

    async fn migrate(&self, table: &str, live: &LiveSchema, schema: &ModelSchema) -> Result<ReconcileOutcome> {
        let declared = normalize_schema(schema)?;
        let live_normalized = normalize_schema(&live.schema)?;

        if declared == live_normalized {
            return Ok(ReconcileOutcome::Unchanged);
        }

        match self.mode {
            MigrationMode::Safe => Err(Error::SchemaMismatch {
                table: table.to_string(),
                hint: SAFE_MODE_HINT.to_string(),
            }),
            MigrationMode::Drop => self.drop_recreate(table, live, schema).await,
            MigrationMode::Alter => match select_migration_strategy(&declared, &live_normalized) {
                MigrationStrategy::DropRecreate => self.drop_recreate(table, live, schema).await,
                MigrationStrategy::Alter => match plan_alter_operations(table, live, &live_normalized, &declared) {
                    AlterPlan::Impossible { field } => {
                        tracing::info!(table = table, field = %field, "Key column type changed, alter is not possible");
                        self.drop_recreate(table, live, schema).await
                    }
                    AlterPlan::Operations(plan) => {
                        self.apply_plan(table, &plan, schema).await?;
                        Ok(ReconcileOutcome::Altered)
                    }
                },
            },
        }
    }

    async fn confirm(&self, table: &str, message: &str) -> Result<()> {
        tracing::info!(table = table, "Requesting confirmation for destructive migration step");

        if self.confirmation.confirm(message).await {
            Ok(())
        } else {
            tracing::warn!(table = table, "Destructive migration step refused");
            Err(Error::SchemaMismatch {
                table: table.to_string(),
                hint: MANUAL_HINT.to_string(),
            })
        }
    }

    async fn create(&self, table: &str, schema: &ModelSchema) -> Result<()> {
        tracing::info!(table = table, "Creating table");
        self.executor.execute_all(&schema_creation_statements(table, schema)?).await
    }

    async fn apply_plan(&self, table: &str, plan: &MigrationPlan, schema: &ModelSchema) -> Result<()> {
        if !plan.removed_views.is_empty() {
            let message = format!(
                "Schema for table \"{}\" has removed materializedViews: {}, are you sure you want to drop them?",
                table,
                serde_json::Value::from(plan.removed_views.clone())
            );
            self.confirm(table, &message).await?;

            for view in &plan.removed_views {
                tracing::info!(table = table, view = %view, "Dropping materialized view");
                self.executor
                    .execute(&Statement::DropMaterializedView { view: view.clone() })
                    .await?;
            }
        }

        if !plan.removed_indexes.is_empty() {
            let message = format!(
                "Schema for table \"{}\" has removed indexes: {}, are you sure you want to drop them?",
                table,
                serde_json::Value::from(plan.removed_indexes.clone())
            );
            self.confirm(table, &message).await?;

            for index in &plan.removed_indexes {
                tracing::info!(table = table, index = %index, "Dropping index");
                self.executor.execute(&Statement::DropIndex { name: index.clone() }).await?;
            }
        }

        let mut search_index_deleted = false;
        for operation in &plan.operations {
            if let Some(message) = &operation.confirmation {
                self.confirm(table, message).await?;
            }
            if operation.is_drop() && !search_index_deleted {
                self.delete_search_index(table, schema).await;
                search_index_deleted = true;
            }
            self.executor.execute(&operation.statement(table)).await?;
        }

        for target in &plan.added_indexes {
            tracing::info!(table = table, index = %target, "Creating index");
            self.executor.execute(&create_index_statement(table, target)).await?;
        }
        for index in &plan.added_custom_indexes {
            tracing::info!(table = table, index = %index.on, "Creating custom index");
            self.executor
                .execute(&create_custom_index_statement(table, index))
                .await?;
        }
        for (name, view) in &plan.added_views {
            tracing::info!(table = table, view = %name, "Creating materialized view");
            self.executor.execute(&create_view_statement(table, name, view)).await?;
        }

        Ok(())
    }

    async fn drop_recreate(&self, table: &str, live: &LiveSchema, schema: &ModelSchema) -> Result<ReconcileOutcome> {
        let message = format!(
            "Schema for table \"{}\" has changed in a way where alter migration is not possible, \
             all data in the table will be lost, are you sure you want to drop the table?",
            table
        );
        self.confirm(table, &message).await?;

        self.delete_search_index(table, schema).await;

        for view in live.schema.materialized_views.keys() {
            tracing::info!(table = table, view = %view, "Dropping materialized view");
            self.executor
                .execute(&Statement::DropMaterializedView { view: view.clone() })
                .await?;
        }

        tracing::info!(table = table, "Dropping table");
        self.executor
            .execute(&Statement::DropTable {
                table: table.to_string(),
            })
            .await?;

        self.create(table, schema).await?;
        Ok(ReconcileOutcome::Recreated)
    }

    /// Drop the search index whose mapping is about to go stale
    async fn delete_search_index(&self, table: &str, schema: &ModelSchema) {
        let Some(search) = &self.search else {
            return;
        };
        if schema.es_index_mapping.is_none() || self.executor.is_dry_run() {
            return;
        }

        let index = search_index_name(self.keyspace(), table);
        if let Err(e) = search.delete_index(&index).await {
            tracing::warn!(table = table, index = %index, error = %e, "Failed to delete search index");
        }
    }

    async fn sync_external(&self, table: &str, schema: &ModelSchema) -> Result<()> {
        if self.executor.is_dry_run() {
            return Ok(());
        }

        if let (Some(search), Some(mapping)) = (&self.search, &schema.es_index_mapping) {
            sync_search_mapping(search, self.keyspace(), table, mapping).await?;
        }
        if let (Some(graph), Some(mapping)) = (&self.graph, &schema.graph_mapping) {
            sync_graph_mapping(graph, self.keyspace(), table, mapping).await?;
        }

        Ok(())
    }
}
