use crate::{
    config::PregelConfig,
    context::{ComputeContext, InitContext},
    error::{Error, Result},
    graph::Graph,
    messages::Messages,
    schema::{PregelSchema, ValueType},
    types::NodeId,
    PregelComputation,
};

pub const DISTANCE: &str = "distance";

/// Single source shortest paths over non-negative relationship weights.
///
/// Unweighted graphs count hops. Unreachable nodes keep an infinite
/// distance. Runs without a reducer, so every candidate distance is queued.
#[derive(Debug, Clone, Copy)]
pub struct ShortestPaths {
    source: NodeId,
}

impl ShortestPaths {
    pub fn new(source: NodeId) -> Self {
        Self { source }
    }
}

impl PregelComputation for ShortestPaths {
    fn schema(&self, _config: &PregelConfig) -> PregelSchema {
        PregelSchema::builder()
            .add(DISTANCE, ValueType::Double)
            .build()
    }

    fn init<G: Graph>(&self, context: &mut InitContext<'_, G>) -> Result<()> {
        if self.source >= context.node_count() {
            return Err(Error::computation(format!(
                "source node {} is out of range for {} nodes",
                self.source,
                context.node_count()
            )));
        }
        let distance = if context.node_id() == self.source {
            0.0
        } else {
            f64::INFINITY
        };
        context.set_double_value(DISTANCE, distance)
    }

    fn compute<G: Graph>(
        &self,
        context: &mut ComputeContext<'_, G>,
        messages: &mut Messages<'_>,
    ) -> Result<()> {
        let current = context.double_value(DISTANCE)?;
        if context.is_initial_superstep() {
            if context.node_id() == self.source {
                context.send_to_neighbors(0.0);
            }
        } else {
            let candidate = messages.fold(f64::INFINITY, f64::min);
            if candidate < current {
                context.set_double_value(DISTANCE, candidate)?;
                context.send_to_neighbors(candidate);
            }
        }
        context.vote_to_halt();
        Ok(())
    }

    fn apply_relationship_weight(&self, value: f64, weight: f64) -> f64 {
        value + weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        computations::test_utils::run,
        graph::{CsrGraph, Orientation},
    };

    fn graph() -> CsrGraph {
        CsrGraph::from_weighted_edges(
            5,
            vec![
                (0, 1, 4.0),
                (0, 2, 1.0),
                (2, 1, 2.0),
                (1, 3, 1.0),
                (2, 3, 5.0),
            ],
            Orientation::Natural,
        )
        .unwrap()
    }

    #[test]
    fn test_weighted() {
        for &(is_asynchronous, use_fork_join) in
            &[(false, false), (false, true), (true, false), (true, true)]
        {
            let config = PregelConfig::builder()
                .is_asynchronous(is_asynchronous)
                .use_fork_join(use_fork_join)
                .build()
                .unwrap();
            let result = run(&graph(), config, ShortestPaths::new(0)).unwrap();
            assert!(result.did_converge());
            let distances = result.node_values().double_properties(DISTANCE).unwrap();
            assert_eq!(&distances[..4], [0.0, 3.0, 1.0, 4.0]);
            assert!(distances[4].is_infinite());
        }
    }

    #[test]
    fn test_hops() {
        let graph =
            CsrGraph::from_edges(4, vec![(0, 1), (1, 2), (2, 3), (0, 3)], Orientation::Natural)
                .unwrap();
        let result = run(&graph, PregelConfig::builder().build().unwrap(), ShortestPaths::new(0))
            .unwrap();
        assert_eq!(
            result.node_values().double_properties(DISTANCE).unwrap(),
            [0.0, 1.0, 2.0, 1.0]
        );
    }

    #[test]
    fn test_source_out_of_range() {
        let result = run(&graph(), PregelConfig::builder().build().unwrap(), ShortestPaths::new(9));
        assert!(matches!(result, Err(Error::Computation(_))));
    }
}
