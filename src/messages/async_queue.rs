use super::{queues::DoubleQueues, Messages, Source};
use crate::{
    memory::{MemoryEstimation, MemoryRange},
    types::{Iteration, NodeId},
};

/// A single queue per node, read while it is being written.
///
/// A message becomes visible as soon as it is stored, so a node computed
/// after the sender within the same superstep already sees it. Messages left
/// unread stay queued for the next superstep.
pub struct AsyncQueueMessenger {
    queues: DoubleQueues,
}

impl AsyncQueueMessenger {
    pub fn new(node_count: u64) -> Self {
        Self {
            queues: DoubleQueues::new(node_count, 0),
        }
    }

    pub fn init_iteration(&mut self, iteration: Iteration) {
        if iteration > 0 {
            self.queues.compact();
        }
    }

    pub fn send_to(&self, target: NodeId, message: f64) {
        self.queues.push(target, message);
    }

    pub fn messages(&self, node: NodeId) -> Messages<'_> {
        Messages::new(Source::Async {
            queues: &self.queues,
            node,
        })
    }

    pub fn release(&mut self) {
        self.queues = DoubleQueues::new(0, 0);
    }

    pub fn memory_estimation() -> MemoryEstimation {
        MemoryEstimation::builder("async queue messenger")
            .per_node("queues", |n| {
                MemoryRange::of(n * DoubleQueues::per_node_size())
            })
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_superstep_visibility() {
        let mut messenger = AsyncQueueMessenger::new(2);
        messenger.init_iteration(0);
        messenger.send_to(1, 1.0);
        messenger.send_to(1, 2.0);
        assert_eq!(messenger.messages(1).collect::<Vec<_>>(), [1.0, 2.0]);
        assert!(messenger.messages(1).is_empty());
    }

    #[test]
    fn test_unread_messages_carry_over() {
        let mut messenger = AsyncQueueMessenger::new(1);
        messenger.init_iteration(0);
        (0..30).for_each(|i| messenger.send_to(0, i as f64));
        let first: Vec<_> = messenger.messages(0).take(20).collect();
        assert_eq!(first, (0..20).map(|i| i as f64).collect::<Vec<_>>());
        messenger.init_iteration(1);
        assert_eq!(
            messenger.messages(0).collect::<Vec<_>>(),
            (20..30).map(|i| i as f64).collect::<Vec<_>>()
        );
    }
}
