use super::{compute_batch, ComputeStep};
use crate::{
    computation::PregelComputation, error::Result, graph::Graph, partition::Partition,
};
use rayon::ThreadPool;

/// Partitions smaller than this are computed without further splitting.
pub const SEQUENTIAL_THRESHOLD: u64 = 1000;

pub(super) fn run<G, C>(step: &ComputeStep<'_, G, C>, pool: &ThreadPool) -> Result<bool>
where
    G: Graph,
    C: PregelComputation,
{
    let partition = Partition::new(0, step.graph.node_count());
    if partition.node_count() == 0 {
        return Ok(false);
    }
    pool.install(|| fork_join(step, step.graph, partition))
}

/// The right half continues on `graph` in the current thread, the left half
/// is the task other threads may steal and runs on its own graph copy. Sent
/// flags merge with a logical OR.
fn fork_join<G, C>(step: &ComputeStep<'_, G, C>, graph: &G, partition: Partition) -> Result<bool>
where
    G: Graph,
    C: PregelComputation,
{
    if partition.node_count() < SEQUENTIAL_THRESHOLD {
        return compute_batch(step, graph, partition);
    }
    let (left, right) = partition.split();
    let (right, left) = rayon::join(
        || fork_join(step, graph, right),
        || {
            let copy = graph.concurrent_copy();
            fork_join(step, &copy, left)
        },
    );
    Ok(left? | right?)
}
