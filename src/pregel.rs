//! The superstep loop.

use crate::{
    bitset::HugeAtomicBitSet,
    computation::PregelComputation,
    compute_step::{ComputeStep, ComputeStrategy},
    config::PregelConfig,
    context::MasterComputeContext,
    error::{Error, Result},
    graph::Graph,
    memory::{available_memory, MemoryEstimation, MemoryRange},
    messages::Messenger,
    node_value::NodeValue,
    progress::{ProgressTask, ProgressTracker, SubTask},
    schema::PregelSchema,
    types::Iteration,
};
use log::{debug, info};
use rayon::ThreadPool;
use std::sync::Arc;

/// The outcome of a run.
pub struct PregelResult {
    node_values: NodeValue,
    did_converge: bool,
    ran_iterations: Iteration,
}

impl PregelResult {
    pub fn node_values(&self) -> &NodeValue {
        &self.node_values
    }

    pub fn into_node_values(self) -> NodeValue {
        self.node_values
    }

    /// False if the run stopped because it reached `max_iterations`.
    pub fn did_converge(&self) -> bool {
        self.did_converge
    }

    /// Number of supersteps executed.
    pub fn ran_iterations(&self) -> Iteration {
        self.ran_iterations
    }

    /// The node value fields meant to be read by the caller.
    pub fn public_keys(&self) -> Vec<&str> {
        self.node_values.schema().public_keys().collect()
    }
}

/// One run of a [`PregelComputation`] over a graph.
///
/// All state is allocated by [`Pregel::create`] and released when the run
/// ends or the value is dropped, whichever comes first.
pub struct Pregel<'a, G, C: PregelComputation> {
    graph: &'a G,
    config: PregelConfig,
    computation: C,
    node_value: NodeValue,
    vote_bits: HugeAtomicBitSet,
    messenger: Messenger,
    strategy: ComputeStrategy,
    executor: &'a ThreadPool,
    progress: Arc<dyn ProgressTracker>,
    released: bool,
}

impl<'a, G, C> Pregel<'a, G, C>
where
    G: Graph,
    C: PregelComputation,
{
    pub fn create(
        graph: &'a G,
        config: PregelConfig,
        computation: C,
        executor: &'a ThreadPool,
        progress: Arc<dyn ProgressTracker>,
    ) -> Result<Self> {
        let config = config.to_builder().build()?;
        let schema = computation.schema(&config);
        schema.validate()?;
        let reducer = computation.reducer();
        let node_count = graph.node_count();
        if config.check_memory() {
            let estimate = Self::memory_estimation(
                &schema,
                reducer.is_none(),
                config.is_asynchronous(),
            )
            .estimate(node_count, config.concurrency());
            debug!("memory estimate:\n{}", estimate);
            if let Some(available) = available_memory() {
                let required = estimate.memory_usage().min();
                if required > available {
                    return Err(Error::InsufficientMemory {
                        required,
                        available,
                    });
                }
            }
        }
        let messenger = Messenger::new(node_count, &config, reducer);
        let strategy = ComputeStrategy::from_config(&config);
        debug!(
            "pregel over {} nodes: {} messenger, {:?} compute steps, concurrency {}",
            node_count,
            messenger.name(),
            strategy,
            config.concurrency()
        );
        Ok(Self {
            graph,
            node_value: NodeValue::new(schema, node_count),
            vote_bits: HugeAtomicBitSet::new(node_count),
            messenger,
            strategy,
            config,
            computation,
            executor,
            progress,
            released: false,
        })
    }

    /// The structural memory needed by a run with the given schema and
    /// messenger kind. A queue based messenger is used when the
    /// computation has no reducer.
    pub fn memory_estimation(
        schema: &PregelSchema,
        is_queue_based: bool,
        is_asynchronous: bool,
    ) -> MemoryEstimation {
        MemoryEstimation::builder("Pregel")
            .add(NodeValue::memory_estimation(schema))
            .per_node("vote bits", |n| {
                MemoryRange::of(HugeAtomicBitSet::memory_estimation(n))
            })
            .add(Messenger::memory_estimation(is_queue_based, is_asynchronous))
            .build()
    }

    /// The sub-tasks a run reports to its [`ProgressTracker`].
    pub fn progress_task(graph: &G, config: &PregelConfig, name: &str) -> ProgressTask {
        let iterations = (0..config.max_iterations())
            .flat_map(|iteration| {
                vec![
                    ProgressTask::leaf(
                        &format!("Compute iteration {}", iteration),
                        graph.node_count(),
                    ),
                    ProgressTask::leaf(&format!("Master compute iteration {}", iteration), 1),
                ]
            })
            .collect();
        ProgressTask::new(name, iterations)
    }

    /// Runs supersteps until convergence or `max_iterations`.
    pub fn run(mut self) -> Result<PregelResult> {
        let result = self.run_supersteps();
        self.computation.close();
        self.release_resources();
        result
    }

    /// Releases the run without running it.
    pub fn release(mut self) {
        self.release_resources();
    }

    fn run_supersteps(&mut self) -> Result<PregelResult> {
        let progress = Arc::clone(&self.progress);
        let _run = SubTask::begin(progress.as_ref(), "Pregel");
        let mut did_converge = false;
        let mut ran_iterations = 0;
        for iteration in 0..self.config.max_iterations() {
            let has_sent_message = {
                let _compute = SubTask::begin(
                    progress.as_ref(),
                    &format!("Compute iteration {}", iteration),
                );
                self.messenger.init_iteration(iteration);
                let step = ComputeStep {
                    graph: self.graph,
                    computation: &self.computation,
                    node_value: &self.node_value,
                    messenger: &self.messenger,
                    vote_bits: &self.vote_bits,
                    config: &self.config,
                    iteration,
                };
                let has_sent_message = self.strategy.run(&step, self.executor)?;
                progress.log_progress(self.graph.node_count());
                has_sent_message
            };
            ran_iterations = iteration + 1;
            let _master = SubTask::begin(
                progress.as_ref(),
                &format!("Master compute iteration {}", iteration),
            );
            let master_converged = self.computation.master_compute(&mut MasterComputeContext::new(
                self.graph,
                &self.node_value,
                &self.config,
                progress.as_ref(),
                iteration,
            ))?;
            did_converge = master_converged
                || (!has_sent_message
                    && self.vote_bits.all_set()
                    && self.messenger.has_converged());
            debug!(
                "superstep {}: sent messages {}, halted {}/{}, master converged {}",
                iteration,
                has_sent_message,
                self.vote_bits.cardinality(),
                self.vote_bits.size(),
                master_converged
            );
            if did_converge {
                break;
            }
        }
        info!(
            "pregel ran {} iterations, converged: {}",
            ran_iterations, did_converge
        );
        let node_values = std::mem::replace(
            &mut self.node_value,
            NodeValue::new(PregelSchema::default(), 0),
        );
        Ok(PregelResult {
            node_values,
            did_converge,
            ran_iterations,
        })
    }
}

impl<G, C: PregelComputation> Pregel<'_, G, C> {
    fn release_resources(&mut self) {
        if !self.released {
            self.released = true;
            self.messenger.release();
            self.progress.release();
        }
    }
}

impl<G, C: PregelComputation> Drop for Pregel<'_, G, C> {
    fn drop(&mut self) {
        self.release_resources();
    }
}
