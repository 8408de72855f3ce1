//! Schema module for cql_sync
//!
//! This module handles schema declaration, normalization, catalog
//! introspection, comparison, DDL generation and reconciliation.

pub mod analyzer;
pub mod datatypes;
pub mod diff;
pub mod generator;
pub mod keyspace;
pub mod normalizer;
pub mod reconciler;
pub mod types;
pub mod validator;

// Re-export key types
pub use analyzer::SchemaAnalyzer;
pub use datatypes::{CqlType, SafeTypeChange};
pub use diff::{AlterOperation, AlterPlan, FieldDifference, MigrationPlan, MigrationStrategy};
pub use generator::{schema_creation_statements, Statement};
pub use keyspace::{KeyspaceReconciler, UdtReconciler};
pub use normalizer::normalize_schema;
pub use reconciler::{ReconcileOutcome, TableReconciler};
pub use types::{
    ClusteringOrder, CustomIndex, FieldDef, LiveSchema, MaterializedView, ModelSchema, NormalizedSchema,
    PrimaryKey,
};
pub use validator::validate_model_schema;
