//! Message passing between supersteps.
//!
//! A run uses exactly one [`Messenger`], chosen from the computation and the
//! config when the run is created:
//!
//! | reducer | asynchronous | messenger |
//! |---------|--------------|-----------|
//! | yes     | any          | Reducing  |
//! | no      | yes          | Async     |
//! | no      | no           | Sync      |

pub use async_queue::AsyncQueueMessenger;
pub use queues::DoubleQueues;
pub use reducer::{Count, Max, Min, Reducer, Sum};
pub use reducing::ReducingMessenger;
pub use sync_queue::SyncQueueMessenger;

use crate::{
    config::PregelConfig,
    memory::MemoryEstimation,
    types::{Iteration, NodeId},
};

mod async_queue;
mod queues;
pub mod reducer;
mod reducing;
mod sync_queue;

pub enum Messenger {
    Sync(SyncQueueMessenger),
    Async(AsyncQueueMessenger),
    Reducing(ReducingMessenger),
}

impl Messenger {
    pub fn new(node_count: u64, config: &PregelConfig, reducer: Option<Box<dyn Reducer>>) -> Self {
        match reducer {
            Some(reducer) => Messenger::Reducing(ReducingMessenger::new(node_count, reducer)),
            None if config.is_asynchronous() => {
                Messenger::Async(AsyncQueueMessenger::new(node_count))
            }
            None => Messenger::Sync(SyncQueueMessenger::new(node_count)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Messenger::Sync(_) => "sync",
            Messenger::Async(_) => "async",
            Messenger::Reducing(_) => "reducing",
        }
    }

    /// Prepares the messenger for superstep `iteration`. Must not overlap
    /// with any `send_to` or message iteration.
    pub fn init_iteration(&mut self, iteration: Iteration) {
        match self {
            Messenger::Sync(m) => m.init_iteration(iteration),
            Messenger::Async(m) => m.init_iteration(iteration),
            Messenger::Reducing(m) => m.init_iteration(iteration),
        }
    }

    /// Safe to call from any number of compute steps at once.
    pub fn send_to(&self, target: NodeId, message: f64) {
        match self {
            Messenger::Sync(m) => m.send_to(target, message),
            Messenger::Async(m) => m.send_to(target, message),
            Messenger::Reducing(m) => m.send_to(target, message),
        }
    }

    /// The messages `node` receives in the current superstep. Nothing is
    /// delivered in the initial superstep.
    pub fn messages(&self, node: NodeId, is_initial_superstep: bool) -> Messages<'_> {
        if is_initial_superstep {
            return Messages::empty();
        }
        match self {
            Messenger::Sync(m) => m.messages(node),
            Messenger::Async(m) => m.messages(node),
            Messenger::Reducing(m) => m.messages(node),
        }
    }

    /// Whether the messenger has nothing left in flight. Combined with the
    /// vote bits and the compute steps' sent flags.
    pub fn has_converged(&self) -> bool {
        match self {
            Messenger::Reducing(m) => m.has_converged(),
            _ => true,
        }
    }

    pub fn release(&mut self) {
        match self {
            Messenger::Sync(m) => m.release(),
            Messenger::Async(m) => m.release(),
            Messenger::Reducing(m) => m.release(),
        }
    }

    pub fn memory_estimation(is_queue_based: bool, is_asynchronous: bool) -> MemoryEstimation {
        match (is_queue_based, is_asynchronous) {
            (false, _) => ReducingMessenger::memory_estimation(),
            (true, true) => AsyncQueueMessenger::memory_estimation(),
            (true, false) => SyncQueueMessenger::memory_estimation(),
        }
    }
}

enum Source<'a> {
    Empty,
    Sync {
        queues: &'a DoubleQueues,
        node: NodeId,
        position: usize,
        limit: usize,
    },
    Async {
        queues: &'a DoubleQueues,
        node: NodeId,
    },
    Reducing {
        message: Option<f64>,
    },
}

/// The messages received by one node in one superstep.
///
/// Async messages are consumed as they are read. Sync and reduced messages
/// are only gone once the superstep ends.
pub struct Messages<'a> {
    source: Source<'a>,
}

impl<'a> Messages<'a> {
    fn new(source: Source<'a>) -> Self {
        Self { source }
    }

    pub fn empty() -> Self {
        Self::new(Source::Empty)
    }

    pub fn is_empty(&self) -> bool {
        match &self.source {
            Source::Empty => true,
            Source::Sync {
                position, limit, ..
            } => position >= limit,
            Source::Async { queues, node } => queues.is_empty(*node),
            Source::Reducing { message } => message.is_none(),
        }
    }
}

impl<'a> Iterator for Messages<'a> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        match &mut self.source {
            Source::Empty => None,
            Source::Sync {
                queues,
                node,
                position,
                limit,
            } => {
                if *position < *limit {
                    *position += 1;
                    queues.get(*node, *position - 1)
                } else {
                    None
                }
            }
            Source::Async { queues, node } => queues.pop(*node),
            Source::Reducing { message } => message.take(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(is_asynchronous: bool) -> PregelConfig {
        PregelConfig::builder()
            .is_asynchronous(is_asynchronous)
            .build()
            .unwrap()
    }

    #[test]
    fn test_selection() {
        assert_eq!(Messenger::new(1, &config(false), None).name(), "sync");
        assert_eq!(Messenger::new(1, &config(true), None).name(), "async");
        assert_eq!(
            Messenger::new(1, &config(true), Some(Box::new(Sum))).name(),
            "reducing"
        );
    }

    #[test]
    fn test_initial_superstep_is_empty() {
        let mut messenger = Messenger::new(1, &config(true), None);
        messenger.init_iteration(0);
        messenger.send_to(0, 1.0);
        assert!(messenger.messages(0, true).is_empty());
        assert_eq!(messenger.messages(0, false).collect::<Vec<_>>(), [1.0]);
    }

    #[test]
    fn test_messages_is_empty() {
        let mut messages = Messages::new(Source::Reducing { message: Some(2.0) });
        assert!(!messages.is_empty());
        assert_eq!(messages.next(), Some(2.0));
        assert!(messages.is_empty());
        assert_eq!(messages.next(), None);
    }

    #[test]
    fn test_memory_estimation() {
        let reducing = Messenger::memory_estimation(false, false).estimate(1000, 4);
        let sync = Messenger::memory_estimation(true, false).estimate(1000, 4);
        let r#async = Messenger::memory_estimation(true, true).estimate(1000, 4);
        assert!(reducing.memory_usage().min() < r#async.memory_usage().min());
        assert!(r#async.memory_usage().min() < sync.memory_usage().min());
    }
}
