//! The user-facing compute contract.

use crate::{
    config::PregelConfig,
    context::{ComputeContext, InitContext, MasterComputeContext},
    error::Result,
    graph::Graph,
    messages::{Messages, Reducer},
    schema::PregelSchema,
};

/// A vertex program.
///
/// `init` and `compute` run concurrently on many worker threads, each call
/// owning exactly one node. `master_compute` runs alone once per superstep,
/// after every node of that superstep was computed.
///
/// Errors returned from any of these abort the run and are handed back by
/// [`crate::Pregel::run`] unchanged. Use [`crate::Error::computation`] to
/// wrap an arbitrary error.
pub trait PregelComputation: Send + Sync {
    /// The node value layout. Called once when the run is created.
    fn schema(&self, config: &PregelConfig) -> PregelSchema;

    /// Called once per node before its first `compute`, in superstep 0.
    fn init<G: Graph>(&self, _context: &mut InitContext<'_, G>) -> Result<()> {
        Ok(())
    }

    /// Called for every node that has messages or has not voted to halt.
    fn compute<G: Graph>(
        &self,
        context: &mut ComputeContext<'_, G>,
        messages: &mut Messages<'_>,
    ) -> Result<()>;

    /// Returning `true` stops the run after the current superstep.
    fn master_compute<G: Graph>(
        &mut self,
        _context: &mut MasterComputeContext<'_, G>,
    ) -> Result<bool> {
        Ok(false)
    }

    /// A reducer selects the reducing messenger: every node then receives at
    /// most one, combined message per superstep.
    fn reducer(&self) -> Option<Box<dyn Reducer>> {
        None
    }

    /// The message sent along a relationship of weight `weight` by
    /// [`ComputeContext::send_to_neighbors`].
    fn apply_relationship_weight(&self, value: f64, _weight: f64) -> f64 {
        value
    }

    /// Called once after the last superstep, whether the run failed or not.
    fn close(&mut self) {}
}
