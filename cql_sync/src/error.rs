//! Error types for cql_sync

use thiserror::Error;

use crate::db::connection::DriverError;

/// Result type for cql_sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for cql_sync
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Invalid query operator: {0}")]
    InvalidOperator(String),

    #[error("Field type not defined for field: {0}")]
    UnknownField(String),

    #[error("{0}")]
    InvalidValue(String),

    #[error("Invalid default value: {0}")]
    InvalidDefaultValue(String),

    #[error("Invalid $in query: {0}")]
    InvalidInOp(String),

    #[error("Invalid $token query: {0}")]
    InvalidTokenOp(String),

    #[error("Invalid $prepend update: {0}")]
    InvalidPrependOp(String),

    #[error("Invalid $replace update: {0}")]
    InvalidReplaceOp(String),

    #[error("Invalid $contains query: {0}")]
    InvalidContainsOp(String),

    #[error("Invalid $contains_key query: {0}")]
    InvalidContainsKeyOp(String),

    #[error("Invalid $expr query: {0}")]
    InvalidExpr(String),

    #[error("Invalid $solr_query: {0}")]
    InvalidSolrQuery(String),

    #[error("Invalid $orderby query: {0}")]
    InvalidOrder(String),

    #[error("Invalid $groupby query: {0}")]
    InvalidGroup(String),

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    #[error("Unset not allowed for {reason} field \"{field}\" in {operation}")]
    UnsetNotAllowed {
        operation: String,
        field: String,
        reason: String,
    },

    #[error("Schema for table \"{table}\" does not match the model, {hint}")]
    SchemaMismatch { table: String, hint: String },

    #[error("Table not found: {0}")]
    SchemaNotFound(String),

    #[error("Error while retrieving schema information: {0}")]
    SchemaQueryError(#[source] DriverError),

    #[error("Error while creating table: {0}")]
    TableCreationError(#[source] DriverError),

    #[error("Error while dropping table: {0}")]
    TableDropError(#[source] DriverError),

    #[error("Error while altering table: {0}")]
    AlterTableError(#[source] DriverError),

    #[error("Error while creating index: {0}")]
    IndexCreationError(#[source] DriverError),

    #[error("Error while dropping index: {0}")]
    IndexDropError(#[source] DriverError),

    #[error("Error while creating materialized view: {0}")]
    ViewCreationError(#[source] DriverError),

    #[error("Error while dropping materialized view: {0}")]
    ViewDropError(#[source] DriverError),

    #[error("Error while asserting keyspace: {0}")]
    KeyspaceError(#[source] DriverError),

    #[error("User defined type error: {0}")]
    UserDefinedTypeError(String),

    #[error("User defined function error: {0}")]
    UserDefinedFunctionError(String),

    #[error("User defined aggregate error: {0}")]
    UserDefinedAggregateError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DriverError),

    #[error("Search index sync error: {0}")]
    SearchSyncError(String),

    #[error("Graph sync error: {0}")]
    GraphSyncError(String),

    #[error("Model registration error: {0}")]
    ModelRegistrationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Convert Serde JSON errors to cql_sync errors
impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

/// Convert YAML errors to cql_sync errors
impl From<serde_yaml::Error> for Error {
    fn from(error: serde_yaml::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

/// Convert TOML deserialization errors to cql_sync errors
impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::ConfigError(error.to_string())
    }
}
