//! Running one superstep over all nodes.
//!
//! Both strategies share [`compute_batch`], the per-node contract:
//!
//! 1. superstep 0 calls `init` first;
//! 2. the node's messages are prepared;
//! 3. `compute` is called if there are messages or the node has not voted to
//!    halt, after clearing its vote.

use crate::{
    bitset::HugeAtomicBitSet,
    computation::PregelComputation,
    config::PregelConfig,
    context::{ComputeContext, InitContext, NodeContext},
    error::Result,
    graph::Graph,
    messages::Messenger,
    node_value::NodeValue,
    partition::Partition,
    types::Iteration,
};
use rayon::ThreadPool;

mod fork_join;
mod partitioned;

pub use fork_join::SEQUENTIAL_THRESHOLD;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeStrategy {
    /// One task per range partition, `concurrency` partitions.
    Partitioned,
    /// Recursive halving down to `SEQUENTIAL_THRESHOLD` nodes.
    ForkJoin,
}

impl ComputeStrategy {
    pub fn from_config(config: &PregelConfig) -> Self {
        if config.use_fork_join() {
            ComputeStrategy::ForkJoin
        } else {
            ComputeStrategy::Partitioned
        }
    }

    /// Computes every node once on `pool` and waits for all of them.
    ///
    /// Returns whether any message was sent. The first error raised by the
    /// computation is returned after the barrier.
    pub(crate) fn run<G, C>(&self, step: &ComputeStep<'_, G, C>, pool: &ThreadPool) -> Result<bool>
    where
        G: Graph,
        C: PregelComputation,
    {
        match self {
            ComputeStrategy::Partitioned => partitioned::run(step, pool),
            ComputeStrategy::ForkJoin => fork_join::run(step, pool),
        }
    }
}

/// Everything a superstep shares between its compute steps.
pub(crate) struct ComputeStep<'a, G, C> {
    pub graph: &'a G,
    pub computation: &'a C,
    pub node_value: &'a NodeValue,
    pub messenger: &'a Messenger,
    pub vote_bits: &'a HugeAtomicBitSet,
    pub config: &'a PregelConfig,
    pub iteration: Iteration,
}

/// Computes the nodes of `partition` sequentially, traversing `graph`.
pub(crate) fn compute_batch<G, C>(
    step: &ComputeStep<'_, G, C>,
    graph: &G,
    partition: Partition,
) -> Result<bool>
where
    G: Graph,
    C: PregelComputation,
{
    let is_initial_superstep = step.iteration == 0;
    let computation = step.computation;
    let apply_weight =
        |value: f64, weight: f64| computation.apply_relationship_weight(value, weight);
    let node_context = || NodeContext::new(graph, step.node_value, step.config, step.iteration);
    let mut init_context = InitContext::new(node_context());
    let mut compute_context =
        ComputeContext::new(node_context(), step.messenger, step.vote_bits, &apply_weight);
    for node in partition.nodes() {
        if is_initial_superstep {
            init_context.set_node_id(node);
            computation.init(&mut init_context)?;
        }
        let mut messages = step.messenger.messages(node, is_initial_superstep);
        if !messages.is_empty() || !step.vote_bits.get(node) {
            step.vote_bits.clear(node);
            compute_context.set_node_id(node);
            computation.compute(&mut compute_context, &mut messages)?;
        }
    }
    Ok(compute_context.has_sent_message())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::Error,
        graph::{CsrGraph, Orientation},
        messages::Messages,
        schema::{PregelSchema, ValueType},
    };
    use rayon::ThreadPoolBuilder;

    /// Counts `init` and `compute` calls per node, sends to itself on node 0.
    struct Counting {
        fail_at: Option<u64>,
    }

    impl PregelComputation for Counting {
        fn schema(&self, _config: &PregelConfig) -> PregelSchema {
            PregelSchema::builder()
                .add("inits", ValueType::Long)
                .add("computes", ValueType::Long)
                .build()
        }

        fn init<G: Graph>(&self, context: &mut InitContext<'_, G>) -> Result<()> {
            context.set_long_value("inits", context.long_value("inits")? + 1)
        }

        fn compute<G: Graph>(
            &self,
            context: &mut ComputeContext<'_, G>,
            _messages: &mut Messages<'_>,
        ) -> Result<()> {
            if Some(context.node_id()) == self.fail_at {
                return Err(Error::computation("failed"));
            }
            context.set_long_value("computes", context.long_value("computes")? + 1)?;
            if context.node_id() == 0 {
                let node_id = context.node_id();
                context.send_to(node_id, 1.0);
            }
            context.vote_to_halt();
            Ok(())
        }
    }

    fn superstep(
        strategy: ComputeStrategy,
        node_count: u64,
        fail_at: Option<u64>,
    ) -> (Result<bool>, NodeValue, HugeAtomicBitSet) {
        let graph = CsrGraph::from_edges(node_count, Vec::new(), Orientation::Natural).unwrap();
        let config = PregelConfig::builder().concurrency(3).build().unwrap();
        let computation = Counting { fail_at };
        let node_value = NodeValue::new(computation.schema(&config), node_count);
        let mut messenger = Messenger::new(node_count, &config, None);
        messenger.init_iteration(0);
        let vote_bits = HugeAtomicBitSet::new(node_count);
        let pool = ThreadPoolBuilder::new().num_threads(3).build().unwrap();
        let result = strategy.run(
            &ComputeStep {
                graph: &graph,
                computation: &computation,
                node_value: &node_value,
                messenger: &messenger,
                vote_bits: &vote_bits,
                config: &config,
                iteration: 0,
            },
            &pool,
        );
        (result, node_value, vote_bits)
    }

    #[test]
    fn test_every_node_once() {
        for &strategy in &[ComputeStrategy::Partitioned, ComputeStrategy::ForkJoin] {
            for &node_count in &[1, 10, SEQUENTIAL_THRESHOLD * 3 + 7] {
                let (result, node_value, vote_bits) = superstep(strategy, node_count, None);
                assert!(result.unwrap());
                for key in &["inits", "computes"] {
                    let counts = node_value.long_properties(key).unwrap();
                    assert!(counts.iter().all(|&n| n == 1), "{:?} {}", strategy, key);
                }
                assert!(vote_bits.all_set());
            }
        }
    }

    #[test]
    fn test_error_propagates() {
        for &strategy in &[ComputeStrategy::Partitioned, ComputeStrategy::ForkJoin] {
            let (result, _, _) = superstep(strategy, 2500, Some(1234));
            assert!(matches!(result, Err(Error::Computation(_))));
        }
    }

    #[test]
    fn test_from_config() {
        let config = PregelConfig::builder().use_fork_join(true).build().unwrap();
        assert_eq!(ComputeStrategy::from_config(&config), ComputeStrategy::ForkJoin);
    }
}
