//! Vertex ranges assigned to units of work.

use crate::types::NodeId;
use std::{fmt, ops::Range};

/// The half-open node range `[start_node, start_node + node_count)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    start_node: NodeId,
    node_count: u64,
}

impl Partition {
    pub fn new(start_node: NodeId, node_count: u64) -> Self {
        Self {
            start_node,
            node_count,
        }
    }

    pub fn start_node(&self) -> NodeId {
        self.start_node
    }

    pub fn node_count(&self) -> u64 {
        self.node_count
    }

    pub fn nodes(&self) -> Range<NodeId> {
        self.start_node..self.start_node + self.node_count
    }

    /// Splits the partition in two halves.
    ///
    /// The left half receives `ceil(node_count / 2)` nodes, so an odd
    /// partition gives its remainder node to the left.
    pub fn split(&self) -> (Partition, Partition) {
        let pivot = (self.node_count + 1) / 2;
        (
            Partition::new(self.start_node, pivot),
            Partition::new(self.start_node + pivot, self.node_count - pivot),
        )
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start_node, self.start_node + self.node_count)
    }
}

/// Covers `[0, node_count)` with at most `concurrency` contiguous, non-empty
/// partitions of near-equal size.
pub fn range_partition(concurrency: usize, node_count: u64) -> Vec<Partition> {
    let concurrency = concurrency.max(1) as u64;
    let batch_size = ((node_count + concurrency - 1) / concurrency).max(1);
    let mut partitions = Vec::with_capacity(concurrency as usize);
    let mut start_node = 0;
    while start_node < node_count {
        let count = batch_size.min(node_count - start_node);
        partitions.push(Partition::new(start_node, count));
        start_node += count;
    }
    partitions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_even() {
        assert_eq!(
            Partition::new(10, 8).split(),
            (Partition::new(10, 4), Partition::new(14, 4))
        );
    }

    #[test]
    fn test_split_odd() {
        assert_eq!(
            Partition::new(0, 7).split(),
            (Partition::new(0, 4), Partition::new(4, 3))
        );
        assert_eq!(
            Partition::new(5, 1).split(),
            (Partition::new(5, 1), Partition::new(6, 0))
        );
    }

    #[test]
    fn test_range_partition() {
        let partitions = range_partition(4, 10);
        assert_eq!(
            partitions,
            [
                Partition::new(0, 3),
                Partition::new(3, 3),
                Partition::new(6, 3),
                Partition::new(9, 1)
            ]
        );
        assert!(range_partition(4, 0).is_empty());
        assert_eq!(range_partition(8, 3).len(), 3);
        assert_eq!(range_partition(0, 5), [Partition::new(0, 5)]);
    }

    #[test]
    fn test_range_partition_covers() {
        for &(concurrency, node_count) in &[(1, 1), (3, 100), (7, 1000), (16, 17)] {
            let partitions = range_partition(concurrency, node_count);
            let mut next = 0;
            for partition in &partitions {
                assert!(partition.node_count() > 0);
                assert_eq!(partition.start_node(), next);
                next = partition.nodes().end;
            }
            assert_eq!(next, node_count);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Partition::new(3, 4).to_string(), "[3, 7)");
    }
}
