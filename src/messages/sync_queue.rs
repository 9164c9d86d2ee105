use super::{queues::DoubleQueues, Messages, Source};
use crate::{
    memory::{MemoryEstimation, MemoryRange},
    types::{Iteration, NodeId},
};

/// Double buffered queues: messages sent in superstep `n` are read in `n + 1`.
pub struct SyncQueueMessenger {
    send: DoubleQueues,
    receive: DoubleQueues,
}

impl SyncQueueMessenger {
    pub fn new(node_count: u64) -> Self {
        Self {
            send: DoubleQueues::new(node_count, 0),
            receive: DoubleQueues::new(node_count, 0),
        }
    }

    pub fn init_iteration(&mut self, _iteration: Iteration) {
        std::mem::swap(&mut self.send, &mut self.receive);
        self.send.clear();
    }

    pub fn send_to(&self, target: NodeId, message: f64) {
        self.send.push(target, message);
    }

    pub fn messages(&self, node: NodeId) -> Messages<'_> {
        Messages::new(Source::Sync {
            queues: &self.receive,
            node,
            position: 0,
            limit: self.receive.tail(node),
        })
    }

    pub fn release(&mut self) {
        self.send = DoubleQueues::new(0, 0);
        self.receive = DoubleQueues::new(0, 0);
    }

    pub fn memory_estimation() -> MemoryEstimation {
        MemoryEstimation::builder("sync queue messenger")
            .per_node("send queues", |n| {
                MemoryRange::of(n * DoubleQueues::per_node_size())
            })
            .per_node("receive queues", |n| {
                MemoryRange::of(n * DoubleQueues::per_node_size())
            })
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_superstep_only() {
        let mut messenger = SyncQueueMessenger::new(2);
        messenger.init_iteration(0);
        messenger.send_to(1, 3.0);
        messenger.send_to(1, 4.0);
        assert!(messenger.messages(1).is_empty());
        messenger.init_iteration(1);
        let mut received: Vec<_> = messenger.messages(1).collect();
        received.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(received, [3.0, 4.0]);
        assert!(messenger.messages(0).is_empty());
        messenger.init_iteration(2);
        assert!(messenger.messages(1).is_empty());
    }
}
