//! Shortest root to root paths recovered from the pairwise table
//!
//! The direct cells form a graph over the roots; Dijkstra over that graph
//! yields, for every root pair, the cheapest chain of direct links and the
//! node sequence realizing it.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use nalgebra::DMatrix;

use super::node::NodeRef;
use super::pairwise::{PairwiseTable, SymmetricMatrix};
use super::tree::Forest;
use crate::common::{NearestNeighborIndex, Path2D, TourSolver, TOLERANCE};

/// Priority queue item for Dijkstra
#[derive(Clone)]
struct QueueItem {
    cost: f64,
    index: usize,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost
    }
}

impl Eq for QueueItem {}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse for min-heap
        other.cost.partial_cmp(&self.cost).unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Best known connection between two roots, stored from the lower root index
/// to the higher one
#[derive(Debug, Clone, PartialEq)]
pub struct RootPath {
    pub distance: f64,
    /// Roots visited, endpoints included
    pub roots: Vec<usize>,
    pub plan: Vec<NodeRef>,
}

impl Default for RootPath {
    fn default() -> Self {
        RootPath {
            distance: f64::INFINITY,
            roots: Vec::new(),
            plan: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PathMatrix {
    paths: SymmetricMatrix<RootPath>,
}

impl PathMatrix {
    pub fn recover<I: NearestNeighborIndex + Default>(forest: &Forest<I>, table: &PairwiseTable) -> Self {
        let n = table.size();
        let adjacency = table.adjacency();

        let mut paths = SymmetricMatrix::new(n);
        for source in 0..n {
            paths.set(
                source,
                source,
                RootPath {
                    distance: 0.0,
                    roots: vec![source],
                    plan: vec![NodeRef::new(source, 0)],
                },
            );

            let (cost, parent) = dijkstra(&adjacency, source);
            for target in source + 1..n {
                if !cost[target].is_finite() {
                    continue;
                }
                let roots = route(&parent, target);
                let plan = stitch(forest, table, &roots);
                paths.set(
                    source,
                    target,
                    RootPath {
                        distance: cost[target],
                        roots,
                        plan,
                    },
                );
            }
        }

        PathMatrix { paths }
    }

    pub fn size(&self) -> usize {
        self.paths.size()
    }

    pub fn distance(&self, i: usize, j: usize) -> f64 {
        self.paths.get(i, j).distance
    }

    pub fn is_connected(&self, i: usize, j: usize) -> bool {
        self.distance(i, j).is_finite()
    }

    /// Every pair of roots is reachable
    pub fn is_complete(&self) -> bool {
        self.paths.cells().all(|(_, _, p)| p.distance.is_finite())
    }

    /// Roots visited going from `i` to `j`
    pub fn roots(&self, i: usize, j: usize) -> Vec<usize> {
        let mut roots = self.paths.get(i, j).roots.clone();
        if i > j {
            roots.reverse();
        }
        roots
    }

    /// Nodes visited going from `i` to `j`, empty when unreachable
    pub fn plan(&self, i: usize, j: usize) -> Vec<NodeRef> {
        let mut plan = self.paths.get(i, j).plan.clone();
        if i > j {
            plan.reverse();
        }
        plan
    }

    pub fn geometry<I: NearestNeighborIndex + Default>(&self, forest: &Forest<I>, i: usize, j: usize) -> Path2D {
        Path2D::from_points(self.plan(i, j).into_iter().map(|r| forest.node(r).position).collect())
    }

    /// Full N x N matrix, infinite where no path exists
    pub fn distance_matrix(&self) -> DMatrix<f64> {
        let n = self.size();
        DMatrix::from_fn(n, n, |i, j| self.distance(i, j))
    }
}

pub(super) fn dijkstra(adjacency: &[Vec<(usize, f64)>], source: usize) -> (Vec<f64>, Vec<Option<usize>>) {
    let n = adjacency.len();
    let mut cost = vec![f64::INFINITY; n];
    let mut parent = vec![None; n];
    let mut closed = vec![false; n];

    cost[source] = 0.0;
    let mut open_set = BinaryHeap::new();
    open_set.push(QueueItem { cost: 0.0, index: source });

    while let Some(current) = open_set.pop() {
        if closed[current.index] {
            continue;
        }
        closed[current.index] = true;

        for &(neighbor, weight) in &adjacency[current.index] {
            if closed[neighbor] {
                continue;
            }
            let new_cost = cost[current.index] + weight;
            if new_cost < cost[neighbor] {
                cost[neighbor] = new_cost;
                parent[neighbor] = Some(current.index);
                open_set.push(QueueItem {
                    cost: new_cost,
                    index: neighbor,
                });
            }
        }
    }

    (cost, parent)
}

/// Roots from the Dijkstra source to `target`, both included
pub(super) fn route(parent: &[Option<usize>], target: usize) -> Vec<usize> {
    let mut roots = vec![target];
    let mut current = target;
    while let Some(p) = parent[current] {
        roots.push(p);
        current = p;
    }
    roots.reverse();
    roots
}

/// Concatenate the plans of consecutive direct links, each oriented along
/// `roots`
pub(super) fn stitch<I: NearestNeighborIndex + Default>(forest: &Forest<I>, table: &PairwiseTable, roots: &[usize]) -> Vec<NodeRef> {
    let mut plan: Vec<NodeRef> = Vec::new();
    for pair in roots.windows(2) {
        let mut segment = table.get(pair[0], pair[1]).plan_refs(forest);
        if segment.first().map_or(false, |r| r.tree != pair[0]) {
            segment.reverse();
        }
        // consecutive links share the root node in between
        if plan.last().is_some() && plan.last() == segment.first() {
            segment.remove(0);
        }
        plan.extend(segment);
    }
    plan
}

/// Greedy nearest-neighbour tour from root 0, improved by 2-opt
#[derive(Debug, Clone, Copy)]
pub struct NearestNeighborTour {
    pub two_opt: bool,
}

impl Default for NearestNeighborTour {
    fn default() -> Self {
        NearestNeighborTour { two_opt: true }
    }
}

/// Length of the closed tour
pub fn tour_length(distances: &DMatrix<f64>, tour: &[usize]) -> f64 {
    if tour.len() < 2 {
        return 0.0;
    }
    (0..tour.len())
        .map(|i| distances[(tour[i], tour[(i + 1) % tour.len()])])
        .sum()
}

impl TourSolver for NearestNeighborTour {
    fn solve(&self, distances: &DMatrix<f64>) -> Vec<usize> {
        let n = distances.nrows();
        if n == 0 {
            return Vec::new();
        }

        let mut tour = vec![0];
        let mut visited = vec![false; n];
        visited[0] = true;
        while tour.len() < n {
            let current = tour[tour.len() - 1];
            let next = (0..n)
                .filter(|&j| !visited[j])
                .min_by(|&a, &b| {
                    distances[(current, a)]
                        .partial_cmp(&distances[(current, b)])
                        .unwrap_or(Ordering::Equal)
                        .then(a.cmp(&b))
                });
            match next {
                Some(j) => {
                    visited[j] = true;
                    tour.push(j);
                }
                None => break,
            }
        }

        if self.two_opt && n > 3 {
            let mut improved = true;
            while improved {
                improved = false;
                for i in 1..n - 1 {
                    for k in i + 1..n {
                        let (a, b) = (tour[i - 1], tour[i]);
                        let (c, e) = (tour[k], tour[(k + 1) % n]);
                        let delta = distances[(a, c)] + distances[(b, e)]
                            - distances[(a, b)]
                            - distances[(c, e)];
                        if delta < -TOLERANCE {
                            tour[i..=k].reverse();
                            improved = true;
                        }
                    }
                }
            }
        }
        tour
    }
}
