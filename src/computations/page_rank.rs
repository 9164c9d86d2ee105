use crate::{
    config::PregelConfig,
    context::{ComputeContext, InitContext},
    error::Result,
    graph::Graph,
    messages::{Messages, Reducer, Sum},
    schema::{PregelSchema, ValueType},
    PregelComputation,
};

pub const PAGE_RANK: &str = "pagerank";

/// PageRank with a fixed number of supersteps.
///
/// Every node starts at `1 / n` and, from superstep 1 on, takes
/// `(1 - d) / n + d * sum(incoming)`. Rank of a node without relationships is
/// not redistributed.
#[derive(Debug, Clone, Copy)]
pub struct PageRank {
    damping_factor: f64,
}

impl PageRank {
    pub fn new(damping_factor: f64) -> Self {
        Self { damping_factor }
    }
}

impl Default for PageRank {
    fn default() -> Self {
        Self::new(0.85)
    }
}

impl PregelComputation for PageRank {
    fn schema(&self, _config: &PregelConfig) -> PregelSchema {
        PregelSchema::builder()
            .add(PAGE_RANK, ValueType::Double)
            .build()
    }

    fn init<G: Graph>(&self, context: &mut InitContext<'_, G>) -> Result<()> {
        context.set_double_value(PAGE_RANK, 1.0 / context.node_count() as f64)
    }

    fn compute<G: Graph>(
        &self,
        context: &mut ComputeContext<'_, G>,
        messages: &mut Messages<'_>,
    ) -> Result<()> {
        let mut rank = context.double_value(PAGE_RANK)?;
        if !context.is_initial_superstep() {
            let sum: f64 = messages.sum();
            rank = (1.0 - self.damping_factor) / context.node_count() as f64
                + self.damping_factor * sum;
            context.set_double_value(PAGE_RANK, rank)?;
        }
        let degree = context.degree();
        if degree > 0 {
            context.send_to_neighbors(rank / degree as f64);
        }
        Ok(())
    }

    fn reducer(&self) -> Option<Box<dyn Reducer>> {
        Some(Box::new(Sum))
    }
}
