//! What user code sees of the run.
//!
//! [`InitContext`] and [`ComputeContext`] are bound to one node at a time and
//! dereference to the shared [`NodeContext`]. [`MasterComputeContext`] sees
//! the whole graph and runs alone.

use crate::{
    bitset::HugeAtomicBitSet,
    config::PregelConfig,
    error::Result,
    graph::Graph,
    messages::Messenger,
    node_value::NodeValue,
    progress::ProgressTracker,
    types::{Iteration, NodeId},
};
use log::{debug, info, warn};
use std::{collections::HashSet, ops::Deref};

/// The weight function of the running computation.
pub(crate) type ApplyWeight<'a> = &'a (dyn Fn(f64, f64) -> f64 + Sync);

/// Runs on worker threads, so its log calls go to the `log` facade rather
/// than to the run's [`ProgressTracker`].
pub struct NodeContext<'a, G> {
    graph: &'a G,
    node_value: &'a NodeValue,
    config: &'a PregelConfig,
    iteration: Iteration,
    node_id: NodeId,
}

impl<'a, G: Graph> NodeContext<'a, G> {
    pub(crate) fn new(
        graph: &'a G,
        node_value: &'a NodeValue,
        config: &'a PregelConfig,
        iteration: Iteration,
    ) -> Self {
        Self {
            graph,
            node_value,
            config,
            iteration,
            node_id: 0,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn node_count(&self) -> u64 {
        self.graph.node_count()
    }

    pub fn relationship_count(&self) -> u64 {
        self.graph.relationship_count()
    }

    pub fn is_multi_graph(&self) -> bool {
        self.graph.is_multi_graph()
    }

    /// The out-degree of the current node.
    pub fn degree(&self) -> u64 {
        self.graph.degree(self.node_id)
    }

    pub fn superstep(&self) -> Iteration {
        self.iteration
    }

    pub fn is_initial_superstep(&self) -> bool {
        self.iteration == 0
    }

    pub fn config(&self) -> &PregelConfig {
        self.config
    }

    pub fn double_value(&self, key: &str) -> Result<f64> {
        self.node_value.double_value(key, self.node_id)
    }

    pub fn set_double_value(&self, key: &str, value: f64) -> Result<()> {
        self.node_value.set_double_value(key, self.node_id, value)
    }

    pub fn long_value(&self, key: &str) -> Result<i64> {
        self.node_value.long_value(key, self.node_id)
    }

    pub fn set_long_value(&self, key: &str, value: i64) -> Result<()> {
        self.node_value.set_long_value(key, self.node_id, value)
    }

    pub fn double_array_value(&self, key: &str) -> Result<Vec<f64>> {
        self.node_value.double_array_value(key, self.node_id)
    }

    pub fn set_double_array_value(&self, key: &str, value: Vec<f64>) -> Result<()> {
        self.node_value
            .set_double_array_value(key, self.node_id, value)
    }

    pub fn long_array_value(&self, key: &str) -> Result<Vec<i64>> {
        self.node_value.long_array_value(key, self.node_id)
    }

    pub fn set_long_array_value(&self, key: &str, value: Vec<i64>) -> Result<()> {
        self.node_value.set_long_array_value(key, self.node_id, value)
    }

    /// Calls `f` for every relationship target, duplicates included.
    pub fn for_each_neighbor<F: FnMut(NodeId)>(&self, mut f: F) {
        self.graph.for_each_neighbor(self.node_id, |target| {
            f(target);
            true
        });
    }

    /// Calls `f` once per distinct target, in first-seen order.
    pub fn for_each_distinct_neighbor<F: FnMut(NodeId)>(&self, mut f: F) {
        if !self.graph.is_multi_graph() {
            return self.for_each_neighbor(f);
        }
        let mut seen = HashSet::new();
        self.for_each_neighbor(|target| {
            if seen.insert(target) {
                f(target);
            }
        });
    }

    pub fn log_debug(&self, message: &str) {
        debug!("node {} superstep {} :: {}", self.node_id, self.iteration, message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!("node {} superstep {} :: {}", self.node_id, self.iteration, message);
    }

    pub fn log_message(&self, message: &str) {
        info!("node {} superstep {} :: {}", self.node_id, self.iteration, message);
    }

    pub(crate) fn set_node_id(&mut self, node_id: NodeId) {
        self.node_id = node_id;
    }
}

/// Handed to [`crate::PregelComputation::init`].
pub struct InitContext<'a, G> {
    node: NodeContext<'a, G>,
}

impl<'a, G: Graph> InitContext<'a, G> {
    pub(crate) fn new(node: NodeContext<'a, G>) -> Self {
        Self { node }
    }

    pub(crate) fn set_node_id(&mut self, node_id: NodeId) {
        self.node.set_node_id(node_id);
    }
}

impl<'a, G> Deref for InitContext<'a, G> {
    type Target = NodeContext<'a, G>;

    fn deref(&self) -> &Self::Target {
        &self.node
    }
}

/// Handed to [`crate::PregelComputation::compute`].
pub struct ComputeContext<'a, G> {
    node: NodeContext<'a, G>,
    messenger: &'a Messenger,
    vote_bits: &'a HugeAtomicBitSet,
    apply_weight: ApplyWeight<'a>,
    has_sent_message: bool,
}

impl<'a, G: Graph> ComputeContext<'a, G> {
    pub(crate) fn new(
        node: NodeContext<'a, G>,
        messenger: &'a Messenger,
        vote_bits: &'a HugeAtomicBitSet,
        apply_weight: ApplyWeight<'a>,
    ) -> Self {
        Self {
            node,
            messenger,
            vote_bits,
            apply_weight,
            has_sent_message: false,
        }
    }

    /// Sends `message` to `target`.
    ///
    /// # Panics
    ///
    /// If `target` is not a node of the graph.
    pub fn send_to(&mut self, target: NodeId, message: f64) {
        let node_count = self.node.node_count();
        assert!(
            target < node_count,
            "message target {} is out of range for {} nodes",
            target,
            node_count
        );
        self.messenger.send_to(target, message);
        self.has_sent_message = true;
    }

    /// Sends `message` along every relationship of the current node, passed
    /// through the computation's relationship weight function.
    pub fn send_to_neighbors(&mut self, message: f64) {
        let (messenger, apply_weight) = (self.messenger, self.apply_weight);
        let mut sent = false;
        self.node
            .graph
            .for_each_relationship(self.node.node_id, 1.0, |target, weight| {
                messenger.send_to(target, apply_weight(message, weight));
                sent = true;
                true
            });
        self.has_sent_message |= sent;
    }

    /// The node stays halted until it receives a message.
    pub fn vote_to_halt(&mut self) {
        self.vote_bits.set(self.node.node_id);
    }

    pub(crate) fn set_node_id(&mut self, node_id: NodeId) {
        self.node.set_node_id(node_id);
    }

    pub(crate) fn has_sent_message(&self) -> bool {
        self.has_sent_message
    }
}

impl<'a, G> Deref for ComputeContext<'a, G> {
    type Target = NodeContext<'a, G>;

    fn deref(&self) -> &Self::Target {
        &self.node
    }
}

/// Handed to [`crate::PregelComputation::master_compute`].
pub struct MasterComputeContext<'a, G> {
    graph: &'a G,
    node_value: &'a NodeValue,
    config: &'a PregelConfig,
    tracker: &'a dyn ProgressTracker,
    iteration: Iteration,
}

impl<'a, G: Graph> MasterComputeContext<'a, G> {
    pub(crate) fn new(
        graph: &'a G,
        node_value: &'a NodeValue,
        config: &'a PregelConfig,
        tracker: &'a dyn ProgressTracker,
        iteration: Iteration,
    ) -> Self {
        Self {
            graph,
            node_value,
            config,
            tracker,
            iteration,
        }
    }

    pub fn node_count(&self) -> u64 {
        self.graph.node_count()
    }

    pub fn relationship_count(&self) -> u64 {
        self.graph.relationship_count()
    }

    pub fn is_multi_graph(&self) -> bool {
        self.graph.is_multi_graph()
    }

    pub fn superstep(&self) -> Iteration {
        self.iteration
    }

    pub fn is_initial_superstep(&self) -> bool {
        self.iteration == 0
    }

    pub fn config(&self) -> &PregelConfig {
        self.config
    }

    /// Every node value. No compute step runs while the master step does.
    pub fn node_value(&self) -> &NodeValue {
        self.node_value
    }

    /// Visits nodes in id order until `f` returns `false`.
    pub fn for_each_node<F: FnMut(NodeId) -> bool>(&self, mut f: F) {
        for node in 0..self.graph.node_count() {
            if !f(node) {
                break;
            }
        }
    }

    pub fn double_value(&self, key: &str, node: NodeId) -> Result<f64> {
        self.node_value.double_value(key, node)
    }

    pub fn set_double_value(&self, key: &str, node: NodeId, value: f64) -> Result<()> {
        self.node_value.set_double_value(key, node, value)
    }

    pub fn long_value(&self, key: &str, node: NodeId) -> Result<i64> {
        self.node_value.long_value(key, node)
    }

    pub fn set_long_value(&self, key: &str, node: NodeId, value: i64) -> Result<()> {
        self.node_value.set_long_value(key, node, value)
    }

    pub fn log_debug(&self, message: &str) {
        self.tracker.log_debug(message);
    }

    pub fn log_warning(&self, message: &str) {
        self.tracker.log_warning(message);
    }

    pub fn log_message(&self, message: &str) {
        self.tracker.log_message(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        graph::{CsrGraph, Orientation},
        progress::EmptyProgressTracker,
        schema::{PregelSchema, ValueType},
    };

    fn fixture() -> (CsrGraph, NodeValue, PregelConfig) {
        let graph = CsrGraph::from_weighted_edges(
            3,
            vec![(0, 1, 2.0), (0, 2, 3.0), (0, 1, 4.0)],
            Orientation::Natural,
        )
        .unwrap();
        let schema = PregelSchema::builder().add("value", ValueType::Double).build();
        (graph, NodeValue::new(schema, 3), PregelConfig::builder().build().unwrap())
    }

    #[test]
    fn test_node_context() {
        let (graph, node_value, config) = fixture();
        let mut context = NodeContext::new(&graph, &node_value, &config, 0);
        context.set_node_id(0);
        assert!(context.is_initial_superstep());
        assert!(context.is_multi_graph());
        assert_eq!(context.degree(), 3);
        let mut all = vec![];
        context.for_each_neighbor(|t| all.push(t));
        assert_eq!(all, [1, 1, 2]);
        let mut distinct = vec![];
        context.for_each_distinct_neighbor(|t| distinct.push(t));
        assert_eq!(distinct, [1, 2]);
        context.set_double_value("value", 4.5).unwrap();
        assert_eq!(node_value.double_value("value", 0).unwrap(), 4.5);
    }

    #[test]
    fn test_send_to_neighbors_applies_weight() {
        let (graph, node_value, config) = fixture();
        let mut messenger = Messenger::new(3, &config, None);
        messenger.init_iteration(0);
        let vote_bits = HugeAtomicBitSet::new(3);
        let add = |value: f64, weight: f64| value + weight;
        {
            let node = NodeContext::new(&graph, &node_value, &config, 0);
            let mut context = ComputeContext::new(node, &messenger, &vote_bits, &add);
            context.set_node_id(1);
            context.send_to_neighbors(1.0);
            assert!(!context.has_sent_message());
            context.set_node_id(0);
            context.send_to_neighbors(1.0);
            context.vote_to_halt();
            assert!(context.has_sent_message());
        }
        assert!(vote_bits.get(0));
        messenger.init_iteration(1);
        let mut received: Vec<_> = messenger.messages(1, false).collect();
        received.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(received, [3.0, 5.0]);
        assert_eq!(messenger.messages(2, false).collect::<Vec<_>>(), [4.0]);
    }

    #[test]
    #[should_panic(expected = "message target 3 is out of range for 3 nodes")]
    fn test_send_to_unknown_node() {
        let (graph, node_value, config) = fixture();
        let messenger = Messenger::new(3, &config, None);
        let vote_bits = HugeAtomicBitSet::new(3);
        let identity = |value: f64, _: f64| value;
        let node = NodeContext::new(&graph, &node_value, &config, 1);
        let mut context = ComputeContext::new(node, &messenger, &vote_bits, &identity);
        context.send_to(3, 1.0);
    }

    #[test]
    fn test_master_context() {
        let (graph, node_value, config) = fixture();
        let context =
            MasterComputeContext::new(&graph, &node_value, &config, &EmptyProgressTracker, 2);
        let mut visited = vec![];
        context.for_each_node(|node| {
            visited.push(node);
            node < 1
        });
        assert_eq!(visited, [0, 1]);
        assert_eq!(context.superstep(), 2);
        context.set_double_value("value", 2, 1.5).unwrap();
        assert_eq!(context.double_value("value", 2).unwrap(), 1.5);
    }
}
