//! Search index sync
//!
//! Tables that declare an `es_index_mapping` get a search index named
//! `<keyspace>_<table>`. The index is asserted and its mapping put after the
//! table is reconciled, and deleted before the table or one of its columns
//! is dropped.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;

/// A search engine that indexes table rows
#[async_trait]
pub trait SearchIndexSync: Send + Sync {
    /// Create the index if it does not exist
    async fn assert_index(&self, keyspace: &str, index: &str) -> Result<()>;

    /// Put the mapping named `mapping` on `index`
    async fn put_mapping(&self, index: &str, mapping: &str, body: &serde_json::Value) -> Result<()>;

    async fn delete_index(&self, index: &str) -> Result<()>;
}

/// Name of the search index backing a table
pub fn search_index_name(keyspace: &str, table: &str) -> String {
    format!("{}_{}", keyspace, table)
}

/// Assert the table's index, then put its mapping
pub async fn sync_search_mapping(
    sync: &Arc<dyn SearchIndexSync>,
    keyspace: &str,
    table: &str,
    mapping: &serde_json::Value,
) -> Result<()> {
    let index = search_index_name(keyspace, table);
    tracing::info!(table = table, index = %index, "Syncing search index mapping");

    sync.assert_index(keyspace, &index).await?;
    sync.put_mapping(&index, table, mapping).await
}
