use crate::{
    config::PregelConfig,
    context::{ComputeContext, InitContext},
    error::Result,
    graph::Graph,
    messages::{Messages, Min, Reducer},
    schema::{PregelSchema, ValueType},
    PregelComputation,
};

pub const COMPONENT: &str = "component";

/// Weakly connected components by minimum label propagation.
///
/// Expects an undirected graph. Every node ends up labeled with the smallest
/// node id of its component.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConnectedComponents;

impl PregelComputation for ConnectedComponents {
    fn schema(&self, _config: &PregelConfig) -> PregelSchema {
        PregelSchema::builder()
            .add(COMPONENT, ValueType::Long)
            .build()
    }

    fn init<G: Graph>(&self, context: &mut InitContext<'_, G>) -> Result<()> {
        context.set_long_value(COMPONENT, context.node_id() as i64)
    }

    fn compute<G: Graph>(
        &self,
        context: &mut ComputeContext<'_, G>,
        messages: &mut Messages<'_>,
    ) -> Result<()> {
        let current = context.long_value(COMPONENT)?;
        if context.is_initial_superstep() {
            context.send_to_neighbors(current as f64);
        } else {
            let candidate = messages.fold(current as f64, f64::min) as i64;
            if candidate < current {
                context.set_long_value(COMPONENT, candidate)?;
                context.send_to_neighbors(candidate as f64);
            }
        }
        context.vote_to_halt();
        Ok(())
    }

    fn reducer(&self) -> Option<Box<dyn Reducer>> {
        Some(Box::new(Min))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        computations::test_utils::run,
        graph::{CsrGraph, Orientation},
    };

    #[test]
    fn test_components() {
        let graph = CsrGraph::from_edges(
            7,
            vec![(5, 1), (1, 3), (3, 6), (0, 4), (4, 2)],
            Orientation::Undirected,
        )
        .unwrap();
        let config = PregelConfig::builder().concurrency(2).build().unwrap();
        let result = run(&graph, config, ConnectedComponents).unwrap();
        assert!(result.did_converge());
        assert_eq!(
            result.node_values().long_properties(COMPONENT).unwrap(),
            [0, 1, 0, 1, 0, 1, 1]
        );
    }

    #[test]
    fn test_isolated_nodes_converge_at_once() {
        let graph = CsrGraph::from_edges(3, Vec::new(), Orientation::Undirected).unwrap();
        let result = run(&graph, PregelConfig::builder().build().unwrap(), ConnectedComponents)
            .unwrap();
        assert!(result.did_converge());
        assert_eq!(result.ran_iterations(), 1);
        assert_eq!(
            result.node_values().long_properties(COMPONENT).unwrap(),
            [0, 1, 2]
        );
    }
}
