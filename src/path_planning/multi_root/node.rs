//! Vertices of the search forest
//!
//! Nodes live in their tree's arena and point at each other by index; a
//! [`NodeRef`] addresses a node anywhere in the forest.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::common::{Point, TOLERANCE};

/// Weight of the goal distance in [`star_distance_cost`]
pub const STAR_GOAL_WEIGHT: f64 = 0.7;
/// Weight of the depth cost in [`star_distance_cost`]
pub const STAR_DEPTH_WEIGHT: f64 = 0.3;

/// Stable address of a node: owning tree and slot in its arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeRef {
    pub tree: usize,
    pub index: usize,
}

impl NodeRef {
    pub fn new(tree: usize, index: usize) -> Self {
        NodeRef { tree, index }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub position: Point,
    /// Tree the node was created in, which is also its originating root
    pub root: usize,
    /// Root of the component the node belongs to after merges
    pub expanded_root: usize,
    /// Parent in the same tree, `None` for the root
    pub closest: Option<usize>,
    pub children: Vec<usize>,
    /// Created by a frontier step; expansion continues from it
    pub force_children: bool,
    pub distance_to_closest: f64,
    pub distance_to_root: f64,
    /// Nodes of other trees reachable by a collision-free straight line
    pub visible_nodes: BTreeMap<NodeRef, f64>,
    id: usize,
    misses: usize,
}

impl Node {
    /// `closest` is the parent slot together with the parent itself; the
    /// expanded root is inherited from it.
    pub fn new(
        id: usize,
        position: Point,
        root: usize,
        closest: Option<(usize, &Node)>,
        distance_to_closest: f64,
        distance_to_root: f64,
    ) -> Self {
        let expanded_root = match closest {
            Some((_, parent)) => parent.expanded_root,
            None => root,
        };

        Node {
            position,
            root,
            expanded_root,
            closest: closest.map(|(index, _)| index),
            children: Vec::new(),
            force_children: false,
            distance_to_closest,
            distance_to_root,
            visible_nodes: BTreeMap::new(),
            id,
            misses: 0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_root(&self) -> bool {
        self.distance_to_root.abs() <= TOLERANCE
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn is_saturated(&self, max_misses: usize) -> bool {
        self.misses >= max_misses
    }

    /// Count a failed expansion. Returns `true` when this miss saturated the
    /// node.
    pub fn record_miss(&mut self, max_misses: usize) -> bool {
        if self.misses >= max_misses {
            return false;
        }
        self.misses += 1;
        self.misses == max_misses
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

/// Frontier key function: cost of expanding `node` towards `goal`
pub type CostFn = fn(&Node, &Point) -> f64;

/// Plain Euclidean distance to the goal
pub fn distance_cost(node: &Node, goal: &Point) -> f64 {
    node.position.distance(goal)
}

/// A*-style blend of goal distance and depth cost
pub fn star_distance_cost(node: &Node, goal: &Point) -> f64 {
    STAR_GOAL_WEIGHT * node.position.distance(goal) + STAR_DEPTH_WEIGHT * node.distance_to_root
}
