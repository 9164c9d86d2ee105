//! Various types shared by the engine.

/// The vertex id type.
///
/// Ids are dense in `[0, node_count)`.
pub type NodeId = u64;

/// The superstep counter type.
pub type Iteration = usize;
