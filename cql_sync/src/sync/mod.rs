//! External sync targets
//!
//! This module holds the contracts for keeping an external search index and
//! a graph store in step with reconciled tables.

pub mod graph;
pub mod search;

// Re-export key types
pub use graph::{graph_name, sync_graph_mapping, GraphSync};
pub use search::{search_index_name, sync_search_mapping, SearchIndexSync};
