//! Growable per-node queues of `f64` messages.

use crate::types::NodeId;
use rayon::prelude::*;
use std::{
    mem::size_of,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        PoisonError, RwLock, RwLockReadGuard,
    },
};

pub const MIN_CAPACITY: usize = 42;

/// A queue whose head advanced past this share of its capacity is compacted.
pub const COMPACT_THRESHOLD: f64 = 0.25;

/// The bit pattern of a slot that holds no message.
///
/// It is a NaN with every payload bit set, which no arithmetic produces.
/// Slots are compared bitwise, so an ordinary NaN is a valid message.
pub const EMPTY_SLOT: u64 = u64::MAX;

fn encode(message: f64) -> u64 {
    let bits = message.to_bits();
    if bits == EMPTY_SLOT {
        f64::NAN.to_bits()
    } else {
        bits
    }
}

fn empty_slots(capacity: usize) -> Box<[AtomicU64]> {
    (0..capacity).map(|_| AtomicU64::new(EMPTY_SLOT)).collect()
}

/// One queue per node.
///
/// ```text
///           head                 tail
///            |                    |
///            v                    v
/// +------+------+------+------+------+------+------+
/// | read | msg  | msg  | msg  | EMPTY| EMPTY| EMPTY|
/// +------+------+------+------+------+------+------+
/// ```
///
/// Producers claim a slot with `fetch_add` on `tail` while holding the read
/// side of `slots`, and store the message afterwards. A claimed but not yet
/// written slot still reads as `EMPTY_SLOT`. Growing takes the write side, so
/// it waits for every producer holding a read guard: those guards are the
/// queue's reference count.
struct Queue {
    slots: RwLock<Box<[AtomicU64]>>,
    head: AtomicUsize,
    tail: AtomicUsize,
}

impl Queue {
    fn new(capacity: usize) -> Self {
        Self {
            slots: RwLock::new(empty_slots(capacity)),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    fn slots(&self) -> RwLockReadGuard<'_, Box<[AtomicU64]>> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn grow(&self, min_capacity: usize) {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let capacity = slots.len();
        if capacity >= min_capacity {
            return;
        }
        let new_capacity = (capacity + (capacity >> 1)).max(min_capacity);
        let grown: Box<[AtomicU64]> = slots
            .iter()
            .map(|slot| AtomicU64::new(slot.load(Ordering::Acquire)))
            .chain((capacity..new_capacity).map(|_| AtomicU64::new(EMPTY_SLOT)))
            .collect();
        *slots = grown;
    }
}

fn is_empty(slots: &[AtomicU64], head: usize, tail: usize) -> bool {
    head >= slots.len() || head >= tail || slots[head].load(Ordering::Acquire) == EMPTY_SLOT
}

pub struct DoubleQueues {
    queues: Vec<Queue>,
}

impl DoubleQueues {
    pub fn new(node_count: u64, initial_capacity: usize) -> Self {
        let capacity = initial_capacity.max(MIN_CAPACITY);
        Self {
            queues: (0..node_count as usize)
                .into_par_iter()
                .map(|_| Queue::new(capacity))
                .collect(),
        }
    }

    /// Appends `message` to the queue of `node`. Safe for concurrent producers.
    pub fn push(&self, node: NodeId, message: f64) {
        let queue = &self.queues[node as usize];
        let index = queue.tail.fetch_add(1, Ordering::AcqRel);
        loop {
            {
                let slots = queue.slots();
                if index < slots.len() {
                    slots[index].store(encode(message), Ordering::Release);
                    return;
                }
            }
            queue.grow(index + 1);
        }
    }

    /// Number of claimed slots of `node`.
    pub fn tail(&self, node: NodeId) -> usize {
        self.queues[node as usize].tail.load(Ordering::Acquire)
    }

    pub fn head(&self, node: NodeId) -> usize {
        self.queues[node as usize].head.load(Ordering::Acquire)
    }

    pub fn capacity(&self, node: NodeId) -> usize {
        self.queues[node as usize].slots().len()
    }

    /// Reads the slot at `index` without consuming it.
    pub fn get(&self, node: NodeId, index: usize) -> Option<f64> {
        let slots = self.queues[node as usize].slots();
        slots
            .get(index)
            .map(|slot| slot.load(Ordering::Acquire))
            .filter(|&bits| bits != EMPTY_SLOT)
            .map(f64::from_bits)
    }

    pub fn is_empty(&self, node: NodeId) -> bool {
        let queue = &self.queues[node as usize];
        let slots = queue.slots();
        is_empty(
            &slots,
            queue.head.load(Ordering::Acquire),
            queue.tail.load(Ordering::Acquire),
        )
    }

    /// Consumes the message at the head of `node`'s queue.
    ///
    /// Only the compute step owning `node` may pop, producers may push
    /// concurrently.
    pub fn pop(&self, node: NodeId) -> Option<f64> {
        let queue = &self.queues[node as usize];
        let slots = queue.slots();
        let head = queue.head.load(Ordering::Acquire);
        if is_empty(&slots, head, queue.tail.load(Ordering::Acquire)) {
            return None;
        }
        let head = queue.head.fetch_add(1, Ordering::AcqRel);
        Some(f64::from_bits(slots[head].load(Ordering::Acquire)))
    }

    /// Forgets every message and resets all queues to empty.
    pub fn clear(&mut self) {
        self.queues.par_iter_mut().for_each(|queue| {
            let tail = *queue.tail.get_mut();
            let slots = queue
                .slots
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner);
            let end = tail.min(slots.len());
            slots[..end]
                .iter_mut()
                .for_each(|slot| *slot.get_mut() = EMPTY_SLOT);
            *queue.head.get_mut() = 0;
            *queue.tail.get_mut() = 0;
        });
    }

    /// Reclaims consumed space between supersteps.
    ///
    /// A drained queue is reset to index 0. A queue whose head passed
    /// `COMPACT_THRESHOLD` of its capacity has its unread window moved to
    /// index 0. Unread messages keep their order.
    pub fn compact(&mut self) {
        self.queues.par_iter_mut().for_each(|queue| {
            let head = *queue.head.get_mut();
            let tail = *queue.tail.get_mut();
            let slots = queue
                .slots
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner);
            let capacity = slots.len();
            let tail = tail.min(capacity);
            if is_empty(slots, head, tail) {
                if head > 0 {
                    slots[..tail]
                        .iter_mut()
                        .for_each(|slot| *slot.get_mut() = EMPTY_SLOT);
                    *queue.head.get_mut() = 0;
                    *queue.tail.get_mut() = 0;
                }
            } else if head as f64 > capacity as f64 * COMPACT_THRESHOLD {
                let length = tail - head;
                for i in 0..length {
                    let message = *slots[head + i].get_mut();
                    *slots[i].get_mut() = message;
                }
                slots[length..]
                    .iter_mut()
                    .for_each(|slot| *slot.get_mut() = EMPTY_SLOT);
                *queue.head.get_mut() = 0;
                *queue.tail.get_mut() = length;
            }
        });
    }

    /// Bytes per node of a freshly allocated queue.
    pub fn per_node_size() -> u64 {
        (size_of::<Queue>() + MIN_CAPACITY * size_of::<AtomicU64>()) as u64
    }
}
