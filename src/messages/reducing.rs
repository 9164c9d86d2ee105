use super::{reducer::Reducer, Messages, Source};
use crate::{
    bitset::HugeAtomicBitSet,
    memory::{MemoryEstimation, MemoryRange},
    types::{Iteration, NodeId},
};
use rayon::prelude::*;
use std::{
    mem::size_of,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
};

/// Folds every message sent to a node into one value.
///
/// Values are kept as `f64` bits in two swapped arrays. A presence bitset
/// marks the nodes that received at least one message, so an identity value
/// is never mistaken for "no message".
pub struct ReducingMessenger {
    reducer: Box<dyn Reducer>,
    send: Vec<AtomicU64>,
    receive: Vec<AtomicU64>,
    send_presence: HugeAtomicBitSet,
    receive_presence: HugeAtomicBitSet,
    sent: AtomicBool,
}

impl ReducingMessenger {
    pub fn new(node_count: u64, reducer: Box<dyn Reducer>) -> Self {
        let identity = reducer.identity().to_bits();
        let array = || {
            (0..node_count as usize)
                .into_par_iter()
                .map(|_| AtomicU64::new(identity))
                .collect::<Vec<_>>()
        };
        Self {
            send: array(),
            receive: array(),
            send_presence: HugeAtomicBitSet::new(node_count),
            receive_presence: HugeAtomicBitSet::new(node_count),
            sent: AtomicBool::new(false),
            reducer,
        }
    }

    pub fn init_iteration(&mut self, _iteration: Iteration) {
        std::mem::swap(&mut self.send, &mut self.receive);
        std::mem::swap(&mut self.send_presence, &mut self.receive_presence);
        let identity = self.reducer.identity().to_bits();
        self.send
            .par_iter_mut()
            .for_each(|value| *value.get_mut() = identity);
        self.send_presence.clear_all();
        *self.sent.get_mut() = false;
    }

    pub fn send_to(&self, target: NodeId, message: f64) {
        let reducer = &self.reducer;
        // The closure always returns `Some`, so the update cannot fail.
        let _ = self.send[target as usize].fetch_update(
            Ordering::AcqRel,
            Ordering::Acquire,
            |current| Some(reducer.reduce(f64::from_bits(current), message).to_bits()),
        );
        self.send_presence.set(target);
        self.sent.store(true, Ordering::Release);
    }

    pub fn messages(&self, node: NodeId) -> Messages<'_> {
        if self.receive_presence.get(node) {
            Messages::new(Source::Reducing {
                message: Some(f64::from_bits(
                    self.receive[node as usize].load(Ordering::Acquire),
                )),
            })
        } else {
            Messages::empty()
        }
    }

    /// True when nothing was combined since the last `init_iteration`.
    pub fn has_converged(&self) -> bool {
        !self.sent.load(Ordering::Acquire)
    }

    pub fn release(&mut self) {
        self.send = vec![];
        self.receive = vec![];
        self.send_presence = HugeAtomicBitSet::new(0);
        self.receive_presence = HugeAtomicBitSet::new(0);
    }

    pub fn memory_estimation() -> MemoryEstimation {
        let per_value = size_of::<AtomicU64>() as u64;
        MemoryEstimation::builder("reducing messenger")
            .per_node("send array", move |n| MemoryRange::of(n * per_value))
            .per_node("receive array", move |n| MemoryRange::of(n * per_value))
            .per_node("send presence", |n| {
                MemoryRange::of(HugeAtomicBitSet::memory_estimation(n))
            })
            .per_node("receive presence", |n| {
                MemoryRange::of(HugeAtomicBitSet::memory_estimation(n))
            })
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::reducer::{Max, Min, Sum};

    #[test]
    fn test_combine() {
        for &(a, b) in &[(3.0, 5.0), (5.0, 3.0)] {
            let mut messenger = ReducingMessenger::new(2, Box::new(Min));
            messenger.init_iteration(0);
            messenger.send_to(1, a);
            messenger.send_to(1, b);
            assert!(!messenger.has_converged());
            messenger.init_iteration(1);
            assert_eq!(messenger.messages(1).collect::<Vec<_>>(), [3.0]);
            assert!(messenger.messages(0).is_empty());
            assert!(messenger.has_converged());
        }
    }

    #[test]
    fn test_identity_is_a_message() {
        let mut messenger = ReducingMessenger::new(1, Box::new(Sum));
        messenger.init_iteration(0);
        messenger.send_to(0, 0.0);
        messenger.init_iteration(1);
        assert_eq!(messenger.messages(0).collect::<Vec<_>>(), [0.0]);
        messenger.init_iteration(2);
        assert!(messenger.messages(0).is_empty());
    }

    #[test]
    fn test_concurrent_send() {
        let mut messenger = ReducingMessenger::new(3, Box::new(Max));
        messenger.init_iteration(0);
        (0..3000u64)
            .into_par_iter()
            .for_each(|i| messenger.send_to(i % 3, i as f64));
        messenger.init_iteration(1);
        assert_eq!(messenger.messages(0).next(), Some(2997.0));
        assert_eq!(messenger.messages(1).next(), Some(2998.0));
        assert_eq!(messenger.messages(2).next(), Some(2999.0));
    }
}
