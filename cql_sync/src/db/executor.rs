//! Schema statement executor
//!
//! This module issues definition statements one at a time, each awaited
//! before the next, and attaches the statement kind to any driver failure.

use crate::db::connection::{DatabaseConnection, DriverError};
use crate::error::{Error, Result};
use crate::schema::generator::Statement;

/// Executor for schema definition statements
#[derive(Clone)]
pub struct SchemaExecutor {
    connection: DatabaseConnection,
    dry_run: bool,
}

impl SchemaExecutor {
    /// Create a new executor; a dry-run executor only logs
    pub fn new(connection: DatabaseConnection, dry_run: bool) -> Self {
        Self { connection, dry_run }
    }

    /// Execute a single statement
    pub async fn execute(&self, statement: &Statement) -> Result<()> {
        let text = statement.to_string();

        if self.dry_run {
            tracing::info!(statement = %text, "Schema statement (dry run)");
            return Ok(());
        }

        tracing::info!(statement = %text, "Executing schema statement");
        self.connection
            .execute_definition_query(&text)
            .await
            .map_err(|e| wrap_error(statement, e))
    }

    /// Execute statements in order, stopping at the first failure
    pub async fn execute_all(&self, statements: &[Statement]) -> Result<()> {
        for statement in statements {
            self.execute(statement).await?;
        }

        Ok(())
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

fn wrap_error(statement: &Statement, error: DriverError) -> Error {
    match statement {
        Statement::CreateTable { .. } => Error::TableCreationError(error),
        Statement::AlterTable { .. } => Error::AlterTableError(error),
        Statement::DropTable { .. } => Error::TableDropError(error),
        Statement::CreateIndex { .. } | Statement::CreateCustomIndex { .. } => Error::IndexCreationError(error),
        Statement::DropIndex { .. } => Error::IndexDropError(error),
        Statement::CreateMaterializedView { .. } => Error::ViewCreationError(error),
        Statement::DropMaterializedView { .. } => Error::ViewDropError(error),
        Statement::CreateKeyspace { .. } | Statement::AlterKeyspace { .. } => Error::KeyspaceError(error),
        Statement::CreateType { name, .. } => {
            Error::UserDefinedTypeError(format!("failed to create type \"{}\": {}", name, error))
        }
        Statement::CreateFunction { name, .. } => {
            Error::UserDefinedFunctionError(format!("failed to create function \"{}\": {}", name, error))
        }
        Statement::CreateAggregate { name, .. } => {
            Error::UserDefinedAggregateError(format!("failed to create aggregate \"{}\": {}", name, error))
        }
    }
}
