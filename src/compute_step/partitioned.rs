use super::{compute_batch, ComputeStep};
use crate::{
    computation::PregelComputation,
    error::{Error, Result},
    graph::Graph,
    partition::range_partition,
};
use log::debug;
use rayon::ThreadPool;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, PoisonError,
};

pub(super) fn run<G, C>(step: &ComputeStep<'_, G, C>, pool: &ThreadPool) -> Result<bool>
where
    G: Graph,
    C: PregelComputation,
{
    let partitions = range_partition(step.config.concurrency(), step.graph.node_count());
    debug!(
        "superstep {}: {} partitions",
        step.iteration,
        partitions.len()
    );
    let has_sent_message = AtomicBool::new(false);
    let first_error: Mutex<Option<Error>> = Mutex::new(None);
    pool.scope(|scope| {
        for partition in partitions {
            let (has_sent_message, first_error) = (&has_sent_message, &first_error);
            scope.spawn(move |_| {
                let graph = step.graph.concurrent_copy();
                match compute_batch(step, &graph, partition) {
                    Ok(sent) => {
                        has_sent_message.fetch_or(sent, Ordering::AcqRel);
                    }
                    Err(e) => {
                        first_error
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .get_or_insert(e);
                    }
                }
            });
        }
    });
    match first_error.into_inner().unwrap_or_else(PoisonError::into_inner) {
        Some(e) => Err(e),
        None => Ok(has_sent_message.into_inner()),
    }
}
