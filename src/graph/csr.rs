use super::Graph;
use crate::{
    error::{Error, Result},
    memory::available_memory,
    types::NodeId,
};
use itertools::Itertools;
use log::info;
use rayon::slice::ParallelSliceMut;
use std::{convert::TryFrom, io::BufRead, mem::size_of, sync::Arc};

/// How the input edges are turned into relationships.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// `(src, dst)` is stored as `src -> dst`.
    Natural,
    /// `(src, dst)` is stored as `dst -> src`.
    Reverse,
    /// `(src, dst)` is stored in both directions.
    Undirected,
}

/// An in-memory compressed sparse row graph.
///
/// ```text
/// offsets:  +-----+-----+-----+-----+   node_count + 1 entries
///           |  0  |  2  |  2  |  5  |
///           +-----+-----+-----+-----+
///              |           |
///              v           v
/// targets:  +-----+-----+-----+-----+-----+   relationship_count entries,
///           | t00 | t01 | t20 | t21 | t22 |   sorted per source node
///           +-----+-----+-----+-----+-----+
/// weights:  | w00 | w01 | w20 | w21 | w22 |   optional, parallel to targets
///           +-----+-----+-----+-----+-----+
/// ```
///
/// All arrays are shared, so [`Graph::concurrent_copy`] is a reference count
/// increment.
#[derive(Debug, Clone)]
pub struct CsrGraph {
    offsets: Arc<[u64]>,
    targets: Arc<[NodeId]>,
    weights: Option<Arc<[f64]>>,
    is_multi_graph: bool,
}

impl CsrGraph {
    pub fn from_edges<E>(node_count: u64, edges: E, orientation: Orientation) -> Result<Self>
    where
        E: IntoIterator<Item = (NodeId, NodeId)>,
    {
        let relationships = orient(
            edges.into_iter().map(|(src, dst)| (src, dst, 1.0)),
            orientation,
        );
        Self::from_relationships(node_count, relationships, false)
    }

    pub fn from_weighted_edges<E>(
        node_count: u64,
        edges: E,
        orientation: Orientation,
    ) -> Result<Self>
    where
        E: IntoIterator<Item = (NodeId, NodeId, f64)>,
    {
        Self::from_relationships(node_count, orient(edges, orientation), true)
    }

    /// Reads whitespace separated `src dst [weight]` lines.
    ///
    /// Empty lines and lines starting with `#` are skipped. The node count is
    /// one past the largest id seen. The graph is weighted if any line carries
    /// a weight; lines without one default to `1.0`.
    pub fn read_edge_list<R: BufRead>(reader: R, orientation: Orientation) -> Result<Self> {
        let mut edges = vec![];
        let mut weighted = false;
        let mut node_count = 0;
        for (line_number, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields = line.split_whitespace().collect_vec();
            let parse_id = |field: &str| {
                field.parse::<NodeId>().map_err(|e| {
                    Error::Parse(format!("line {}: `{}`: {}", line_number + 1, field, e))
                })
            };
            let (src, dst, weight) = match *fields.as_slice() {
                [src, dst] => (parse_id(src)?, parse_id(dst)?, 1.0),
                [src, dst, weight] => {
                    weighted = true;
                    let weight = weight.parse::<f64>().map_err(|e| {
                        Error::Parse(format!("line {}: `{}`: {}", line_number + 1, weight, e))
                    })?;
                    (parse_id(src)?, parse_id(dst)?, weight)
                }
                _ => {
                    return Err(Error::Parse(format!(
                        "line {}: expected `src dst [weight]`",
                        line_number + 1
                    )))
                }
            };
            node_count = src
                .max(dst)
                .checked_add(1)
                .ok_or_else(|| {
                    Error::Parse(format!(
                        "line {}: node id {} is too large",
                        line_number + 1,
                        src.max(dst)
                    ))
                })?
                .max(node_count);
            edges.push((src, dst, weight));
        }
        info!("read {} edges over {} nodes", edges.len(), node_count);
        Self::from_relationships(node_count, orient(edges, orientation), weighted)
    }

    fn from_relationships(
        node_count: u64,
        mut relationships: Vec<(NodeId, NodeId, f64)>,
        weighted: bool,
    ) -> Result<Self> {
        if let Some(&(src, dst, _)) = relationships
            .iter()
            .find(|&&(src, dst, _)| src >= node_count || dst >= node_count)
        {
            return Err(Error::Parse(format!(
                "relationship ({}, {}) is out of range for {} nodes",
                src, dst, node_count
            )));
        }
        let mut offsets = allocate_offsets(node_count)?;
        relationships.par_sort_unstable_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        for &(src, _, _) in &relationships {
            offsets[src as usize + 1] += 1;
        }
        for i in 1..offsets.len() {
            offsets[i] += offsets[i - 1];
        }
        let is_multi_graph = relationships
            .iter()
            .tuple_windows()
            .any(|(a, b)| a.0 == b.0 && a.1 == b.1);
        let targets: Arc<[NodeId]> = relationships.iter().map(|r| r.1).collect();
        let weights: Option<Arc<[f64]>> = if weighted {
            Some(relationships.iter().map(|r| r.2).collect())
        } else {
            None
        };
        Ok(Self {
            offsets: offsets.into(),
            targets,
            weights,
            is_multi_graph,
        })
    }

    pub fn has_weights(&self) -> bool {
        self.weights.is_some()
    }

    fn range(&self, node: NodeId) -> std::ops::Range<usize> {
        self.offsets[node as usize] as usize..self.offsets[node as usize + 1] as usize
    }
}

/// Zeroed offsets for `node_count` nodes, or `Parse` if they cannot be held.
fn allocate_offsets(node_count: u64) -> Result<Vec<u64>> {
    let too_many = || Error::Parse(format!("{} nodes do not fit in memory", node_count));
    let len = usize::try_from(node_count)
        .ok()
        .and_then(|n| n.checked_add(1))
        .ok_or_else(too_many)?;
    let bytes = (len as u64).saturating_mul(size_of::<u64>() as u64);
    if available_memory().map_or(false, |available| bytes > available) {
        return Err(too_many());
    }
    let mut offsets = Vec::new();
    offsets.try_reserve_exact(len).map_err(|_| too_many())?;
    offsets.resize(len, 0);
    Ok(offsets)
}

fn orient<E>(edges: E, orientation: Orientation) -> Vec<(NodeId, NodeId, f64)>
where
    E: IntoIterator<Item = (NodeId, NodeId, f64)>,
{
    let edges = edges.into_iter();
    match orientation {
        Orientation::Natural => edges.collect(),
        Orientation::Reverse => edges.map(|(src, dst, w)| (dst, src, w)).collect(),
        Orientation::Undirected => edges
            .flat_map(|(src, dst, w)| vec![(src, dst, w), (dst, src, w)])
            .collect(),
    }
}

impl Graph for CsrGraph {
    fn node_count(&self) -> u64 {
        (self.offsets.len() - 1) as u64
    }

    fn relationship_count(&self) -> u64 {
        self.targets.len() as u64
    }

    fn is_multi_graph(&self) -> bool {
        self.is_multi_graph
    }

    fn degree(&self, node: NodeId) -> u64 {
        self.offsets[node as usize + 1] - self.offsets[node as usize]
    }

    fn for_each_neighbor<F>(&self, node: NodeId, mut f: F)
    where
        F: FnMut(NodeId) -> bool,
    {
        for &target in &self.targets[self.range(node)] {
            if !f(target) {
                break;
            }
        }
    }

    fn for_each_relationship<F>(&self, node: NodeId, fallback_weight: f64, mut f: F)
    where
        F: FnMut(NodeId, f64) -> bool,
    {
        let range = self.range(node);
        match &self.weights {
            Some(weights) => {
                for (&target, &weight) in self.targets[range.clone()].iter().zip(&weights[range]) {
                    if !f(target, weight) {
                        break;
                    }
                }
            }
            None => self.for_each_neighbor(node, |target| f(target, fallback_weight)),
        }
    }

    fn concurrent_copy(&self) -> Self {
        self.clone()
    }
}
