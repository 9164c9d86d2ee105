//! A fixed-size bitset supporting concurrent writers.

use crate::types::NodeId;
use std::sync::atomic::{AtomicU64, Ordering};

const NUM_BITS: u64 = 64;

/// One bit per node, backed by atomic words.
///
/// ```text
/// +--------------------+--------------------+
/// |  word 0: bits 0-63 | word 1: bits 64-127|   ...
/// +--------------------+--------------------+
/// ```
///
/// Bits past `num_bits` in the last word are never set, so [`all_set`]
/// only has to compare whole words and mask the tail.
///
/// [`all_set`]: HugeAtomicBitSet::all_set
pub struct HugeAtomicBitSet {
    words: Vec<AtomicU64>,
    num_bits: u64,
}

impl HugeAtomicBitSet {
    pub fn new(num_bits: u64) -> Self {
        let num_words = ((num_bits + NUM_BITS - 1) / NUM_BITS) as usize;
        Self {
            words: (0..num_words).map(|_| AtomicU64::new(0)).collect(),
            num_bits,
        }
    }

    pub fn size(&self) -> u64 {
        self.num_bits
    }

    pub fn get(&self, index: NodeId) -> bool {
        let (word, mask) = self.locate(index);
        self.words[word].load(Ordering::Acquire) & mask != 0
    }

    pub fn set(&self, index: NodeId) {
        let (word, mask) = self.locate(index);
        self.words[word].fetch_or(mask, Ordering::AcqRel);
    }

    /// Sets the bit and returns its previous state.
    pub fn get_and_set(&self, index: NodeId) -> bool {
        let (word, mask) = self.locate(index);
        self.words[word].fetch_or(mask, Ordering::AcqRel) & mask != 0
    }

    pub fn clear(&self, index: NodeId) {
        let (word, mask) = self.locate(index);
        self.words[word].fetch_and(!mask, Ordering::AcqRel);
    }

    pub fn clear_all(&self) {
        self.words
            .iter()
            .for_each(|word| word.store(0, Ordering::Release));
    }

    pub fn cardinality(&self) -> u64 {
        self.words
            .iter()
            .map(|word| word.load(Ordering::Acquire).count_ones() as u64)
            .sum()
    }

    pub fn all_set(&self) -> bool {
        let full_words = (self.num_bits / NUM_BITS) as usize;
        if self.words[..full_words]
            .iter()
            .any(|word| word.load(Ordering::Acquire) != u64::MAX)
        {
            return false;
        }
        let tail_bits = self.num_bits % NUM_BITS;
        tail_bits == 0 || {
            let mask = (1u64 << tail_bits) - 1;
            self.words[full_words].load(Ordering::Acquire) & mask == mask
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words
            .iter()
            .all(|word| word.load(Ordering::Acquire) == 0)
    }

    /// Number of bytes held by a bitset of `num_bits` bits.
    pub fn memory_estimation(num_bits: u64) -> u64 {
        (num_bits + NUM_BITS - 1) / NUM_BITS * std::mem::size_of::<AtomicU64>() as u64
    }

    fn locate(&self, index: NodeId) -> (usize, u64) {
        debug_assert!(index < self.num_bits);
        ((index / NUM_BITS) as usize, 1u64 << (index % NUM_BITS))
    }
}
