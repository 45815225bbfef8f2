//! Best link found so far between every pair of roots
//!
//! Direct cells come from two mutually visible nodes. Pairs without one are
//! filled by composing direct cells through intermediate roots.

use itertools::Itertools;

use super::node::NodeRef;
use super::recovery::{dijkstra, route, stitch};
use super::tree::Forest;
use crate::common::NearestNeighborIndex;

/// Dense upper-triangular storage of a symmetric `size x size` matrix.
/// `get(i, j)` and `get(j, i)` address the same cell.
#[derive(Debug, Clone)]
pub struct SymmetricMatrix<T> {
    holder: Vec<T>,
    size: usize,
}

impl<T: Clone + Default> SymmetricMatrix<T> {
    pub fn new(size: usize) -> Self {
        SymmetricMatrix {
            holder: vec![T::default(); size * (size + 1) / 2],
            size,
        }
    }
}

impl<T> SymmetricMatrix<T> {
    pub fn size(&self) -> usize {
        self.size
    }

    fn index(&self, i: usize, j: usize) -> usize {
        let (i, j) = if i <= j { (i, j) } else { (j, i) };
        debug_assert!(j < self.size, "cell ({}, {}) outside a {}x{} matrix", i, j, self.size, self.size);
        // rows before i hold size, size - 1, ... cells
        i * (2 * self.size - i + 1) / 2 + (j - i)
    }

    pub fn get(&self, i: usize, j: usize) -> &T {
        &self.holder[self.index(i, j)]
    }

    pub fn get_mut(&mut self, i: usize, j: usize) -> &mut T {
        let idx = self.index(i, j);
        &mut self.holder[idx]
    }

    pub fn set(&mut self, i: usize, j: usize, value: T) {
        *self.get_mut(i, j) = value;
    }

    /// Upper triangle with diagonal, row by row
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, &T)> + '_ {
        (0..self.size)
            .flat_map(move |i| (i..self.size).map(move |j| (i, j)))
            .map(move |(i, j)| (i, j, self.get(i, j)))
    }
}

/// Candidate inter-root connection
///
/// A direct holder links a pair of mutually visible nodes; its distance is the
/// path length root -> node1 -> node2 -> root. A composed holder points at the
/// two roots themselves and lists the roots it passes through in `via`.
/// `node1` always has the smaller node id.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceHolder {
    pub node1: Option<NodeRef>,
    pub node2: Option<NodeRef>,
    pub distance: f64,
    /// Node sequence from the root of `node1` to the root of `node2`,
    /// filled by [`DistanceHolder::extract_plan`]
    pub plan: Vec<NodeRef>,
    /// Intermediate roots, empty for a direct link
    pub via: Vec<usize>,
}

impl Default for DistanceHolder {
    fn default() -> Self {
        DistanceHolder {
            node1: None,
            node2: None,
            distance: f64::INFINITY,
            plan: Vec::new(),
            via: Vec::new(),
        }
    }
}

impl DistanceHolder {
    pub fn new<I: NearestNeighborIndex + Default>(forest: &Forest<I>, a: NodeRef, b: NodeRef) -> Self {
        let (node1, node2) = if forest.node(a).id() <= forest.node(b).id() {
            (a, b)
        } else {
            (b, a)
        };
        let mut holder = DistanceHolder {
            node1: Some(node1),
            node2: Some(node2),
            distance: f64::INFINITY,
            plan: Vec::new(),
            via: Vec::new(),
        };
        holder.update_distance(forest);
        holder
    }

    /// Connection along `roots` (endpoints included) with its stitched plan.
    /// Stored from the lower root to the higher one, reversing `plan` if needed.
    pub fn composed(roots: &[usize], distance: f64, plan: Vec<NodeRef>) -> Self {
        let mut roots = roots.to_vec();
        let mut plan = plan;
        if roots.first() > roots.last() {
            roots.reverse();
            plan.reverse();
        }
        if roots.len() < 2 {
            return DistanceHolder::default();
        }
        let (first, last) = (roots[0], roots[roots.len() - 1]);
        // root nodes sit at slot 0 and carry their root index as id
        DistanceHolder {
            node1: Some(NodeRef::new(first, 0)),
            node2: Some(NodeRef::new(last, 0)),
            distance,
            plan,
            via: roots[1..roots.len() - 1].to_vec(),
        }
    }

    pub fn exists(&self) -> bool {
        self.node1.is_some() && self.node2.is_some()
    }

    pub fn is_direct(&self) -> bool {
        self.exists() && self.via.is_empty()
    }

    /// Recompute the distance of a direct link from the current tree costs
    pub fn update_distance<I: NearestNeighborIndex + Default>(&mut self, forest: &Forest<I>) {
        if !self.via.is_empty() {
            return;
        }
        if let (Some(a), Some(b)) = (self.node1, self.node2) {
            let (n1, n2) = (forest.node(a), forest.node(b));
            self.distance =
                n1.distance_to_root + n2.distance_to_root + n1.position.distance(&n2.position);
        }
    }

    /// Node sequence from the root of `node1` to the root of `node2`
    pub fn plan_refs<I: NearestNeighborIndex + Default>(&self, forest: &Forest<I>) -> Vec<NodeRef> {
        if !self.via.is_empty() {
            return self.plan.clone();
        }
        match (self.node1, self.node2) {
            (Some(a), Some(b)) => {
                let mut plan = forest.path_to_root(a);
                plan.reverse();
                plan.extend(forest.path_to_root(b));
                plan
            }
            _ => Vec::new(),
        }
    }

    pub fn extract_plan<I: NearestNeighborIndex + Default>(&mut self, forest: &Forest<I>) {
        self.plan = self.plan_refs(forest);
    }

    /// Trees of `node1` and `node2`
    pub fn trees(&self) -> Option<(usize, usize)> {
        Some((self.node1?.tree, self.node2?.tree))
    }
}

/// One [`DistanceHolder`] per unordered root pair
#[derive(Debug, Clone)]
pub struct PairwiseTable {
    matrix: SymmetricMatrix<DistanceHolder>,
}

impl PairwiseTable {
    pub fn new(num_roots: usize) -> Self {
        PairwiseTable {
            matrix: SymmetricMatrix::new(num_roots),
        }
    }

    pub fn size(&self) -> usize {
        self.matrix.size()
    }

    pub fn exists(&self, i: usize, j: usize) -> bool {
        self.matrix.get(i, j).exists()
    }

    pub fn get(&self, i: usize, j: usize) -> &DistanceHolder {
        self.matrix.get(i, j)
    }

    /// Store a direct `holder` when it beats the current cell or the cell is
    /// not direct yet. Returns `true` on replacement.
    pub fn update(&mut self, i: usize, j: usize, holder: DistanceHolder) -> bool {
        debug_assert!(holder
            .trees()
            .map_or(true, |(a, b)| (a, b) == (i, j) || (a, b) == (j, i)));
        let cell = self.matrix.get_mut(i, j);
        if holder.distance < cell.distance || (holder.is_direct() && !cell.is_direct()) {
            *cell = holder;
            true
        } else {
            false
        }
    }

    /// Refresh every direct cell after tree costs changed, then recompose
    /// the indirect ones
    pub fn update_all<I: NearestNeighborIndex + Default>(&mut self, forest: &Forest<I>) {
        for i in 0..self.size() {
            for j in i + 1..self.size() {
                let cell = self.matrix.get_mut(i, j);
                if cell.is_direct() {
                    cell.update_distance(forest);
                    if !cell.plan.is_empty() {
                        cell.extract_plan(forest);
                    }
                }
            }
        }
        self.compose(forest);
    }

    /// Fill every pair without a direct cell with the shortest chain of
    /// direct cells joining it. Returns the pairs that had no cell before.
    pub fn compose<I: NearestNeighborIndex + Default>(&mut self, forest: &Forest<I>) -> Vec<(usize, usize)> {
        let adjacency = self.adjacency();
        let mut composed = Vec::new();
        for source in 0..self.size() {
            let (cost, parent) = dijkstra(&adjacency, source);
            for target in source + 1..self.size() {
                if self.get(source, target).is_direct() || !cost[target].is_finite() {
                    continue;
                }
                let roots = route(&parent, target);
                let plan = stitch(forest, self, &roots);
                composed.push((source, target, DistanceHolder::composed(&roots, cost[target], plan)));
            }
        }

        // direct cells are never removed, so a composed pair stays reachable
        let mut filled = Vec::new();
        for (i, j, holder) in composed {
            if !self.exists(i, j) {
                filled.push((i, j));
            }
            self.matrix.set(i, j, holder);
        }
        filled
    }

    /// Neighbour lists of the root graph whose edges are the direct cells
    pub fn adjacency(&self) -> Vec<Vec<(usize, f64)>> {
        let mut adjacency = vec![Vec::new(); self.size()];
        for (i, j, cell) in self.direct_links() {
            adjacency[i].push((j, cell.distance));
            adjacency[j].push((i, cell.distance));
        }
        adjacency
    }

    /// Populated off-diagonal cells as `(i, j, cell)` with `i < j`
    pub fn links(&self) -> impl Iterator<Item = (usize, usize, &DistanceHolder)> + '_ {
        self.matrix.cells().filter(|&(i, j, cell)| i != j && cell.exists())
    }

    pub fn direct_links(&self) -> impl Iterator<Item = (usize, usize, &DistanceHolder)> + '_ {
        self.links().filter(|&(_, _, cell)| cell.is_direct())
    }

    pub fn num_links(&self) -> usize {
        self.direct_links().count()
    }

    /// Root pairs without any cell
    pub fn missing_pairs(&self) -> Vec<(usize, usize)> {
        (0..self.size())
            .tuple_combinations()
            .filter(|&(i, j)| !self.exists(i, j))
            .collect()
    }

    /// Every root pair has a direct or composed cell
    pub fn is_complete(&self) -> bool {
        self.missing_pairs().is_empty()
    }
}
