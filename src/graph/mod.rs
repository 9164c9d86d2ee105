//! The read-only graph consumed by the engine.

pub use csr::{CsrGraph, Orientation};

use crate::types::NodeId;

mod csr;

/// A read-only adjacency structure.
///
/// Implementations are shared by all worker threads of a run. Traversal state,
/// if any, must live in the handle returned by [`Graph::concurrent_copy`], so
/// that forked tasks never contend on it.
pub trait Graph: Send + Sync {
    fn node_count(&self) -> u64;

    fn relationship_count(&self) -> u64;

    /// Whether two relationships may connect the same pair of nodes.
    fn is_multi_graph(&self) -> bool;

    fn degree(&self, node: NodeId) -> u64;

    /// Calls `f` for each target of `node` until it returns `false`.
    fn for_each_neighbor<F>(&self, node: NodeId, f: F)
    where
        F: FnMut(NodeId) -> bool;

    /// Calls `f` with each target and relationship weight of `node` until it
    /// returns `false`. Unweighted graphs report `fallback_weight`.
    fn for_each_relationship<F>(&self, node: NodeId, fallback_weight: f64, f: F)
    where
        F: FnMut(NodeId, f64) -> bool;

    /// An independent traversal handle over the same graph.
    fn concurrent_copy(&self) -> Self
    where
        Self: Sized;
}
