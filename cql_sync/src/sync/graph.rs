//! Graph sync
//!
//! Tables that declare a `graph_mapping` have it put on the keyspace graph,
//! named `<keyspace>_graph`.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;

/// A graph store mirroring table rows as vertices and edges
#[async_trait]
pub trait GraphSync: Send + Sync {
    /// Create the graph if it does not exist
    async fn assert_graph(&self, graph: &str) -> Result<()>;

    async fn put_mapping(&self, graph: &str, mapping: &str, body: &serde_json::Value) -> Result<()>;
}

pub fn graph_name(keyspace: &str) -> String {
    format!("{}_graph", keyspace)
}

/// Assert the keyspace graph, then put the table's mapping on it
pub async fn sync_graph_mapping(
    sync: &Arc<dyn GraphSync>,
    keyspace: &str,
    table: &str,
    mapping: &serde_json::Value,
) -> Result<()> {
    let graph = graph_name(keyspace);
    tracing::info!(table = table, graph = %graph, "Syncing graph mapping");

    sync.assert_graph(&graph).await?;
    sync.put_mapping(&graph, table, mapping).await
}
