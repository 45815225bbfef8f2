//! Indexed binary min-heap of frontier nodes
//!
//! Each frontier chases one goal configuration. The heap stores node slots of
//! its owning tree and keeps a slot -> position map so a key can be changed in
//! place after rewiring shortens a path.

use std::cmp::Ordering;
use std::collections::HashMap;

use ordered_float::OrderedFloat;

use super::node::{CostFn, Node};
use crate::common::{Point, TOLERANCE};

#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    key: OrderedFloat<f64>,
    node: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

// Lower key first, then older node
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key).then(self.node.cmp(&other.node))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone)]
pub struct Heap {
    entries: Vec<HeapEntry>,
    positions: HashMap<usize, usize>,
    goal: Point,
    cost: CostFn,
}

impl Heap {
    pub fn new(goal: Point, cost: CostFn) -> Self {
        Heap {
            entries: Vec::new(),
            positions: HashMap::new(),
            goal,
            cost,
        }
    }

    /// Heap over every node of `nodes`
    pub fn from_nodes(nodes: &[Node], goal: Point, cost: CostFn) -> Self {
        let mut heap = Heap::new(goal, cost);
        for index in 0..nodes.len() {
            heap.push(nodes, index);
        }
        heap
    }

    pub fn goal(&self) -> Point {
        self.goal
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, node: usize) -> bool {
        self.positions.contains_key(&node)
    }

    pub fn key_of(&self, nodes: &[Node], node: usize) -> f64 {
        (self.cost)(&nodes[node], &self.goal)
    }

    /// Insert `node`, or refresh its key when it is already queued
    pub fn push(&mut self, nodes: &[Node], node: usize) {
        if self.contains(node) {
            self.update_key(nodes, node);
            return;
        }
        let key = OrderedFloat(self.key_of(nodes, node));
        let pos = self.entries.len();
        self.entries.push(HeapEntry { key, node });
        self.positions.insert(node, pos);
        self.sift_up(pos);
    }

    /// Lowest-key node with its stored key
    pub fn top(&self) -> Option<(usize, f64)> {
        self.entries.first().map(|e| (e.node, e.key.0))
    }

    pub fn pop(&mut self) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        let last = self.entries.len() - 1;
        self.swap(0, last);
        let entry = self.entries.pop()?;
        self.positions.remove(&entry.node);
        if !self.entries.is_empty() {
            self.sift_down(0);
        }
        Some(entry.node)
    }

    /// Recompute the key of a queued node. Returns `false` when the node is
    /// not in the heap.
    pub fn update_key(&mut self, nodes: &[Node], node: usize) -> bool {
        let pos = match self.positions.get(&node) {
            Some(&pos) => pos,
            None => return false,
        };
        let key = OrderedFloat(self.key_of(nodes, node));
        let old = self.entries[pos].key;
        self.entries[pos].key = key;
        if key < old {
            self.sift_up(pos);
        } else {
            self.sift_down(pos);
        }
        true
    }

    pub fn remove(&mut self, node: usize) -> bool {
        let pos = match self.positions.get(&node) {
            Some(&pos) => pos,
            None => return false,
        };
        let last = self.entries.len() - 1;
        self.swap(pos, last);
        self.entries.pop();
        self.positions.remove(&node);
        if pos < self.entries.len() {
            self.sift_up(pos);
            self.sift_down(pos);
        }
        true
    }

    /// Bring the heap top up to date without popping it.
    ///
    /// Tops for which `drop` holds are discarded; tops whose cost grew since
    /// they were keyed are re-inserted with the current key.
    pub fn settle<F>(&mut self, nodes: &[Node], drop: F) -> Option<(usize, f64)>
    where
        F: Fn(&Node) -> bool,
    {
        while let Some((node, stored)) = self.top() {
            if drop(&nodes[node]) {
                self.pop();
                continue;
            }
            let current = self.key_of(nodes, node);
            if current > stored + TOLERANCE {
                self.update_key(nodes, node);
                continue;
            }
            return Some((node, stored));
        }
        None
    }

    fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.entries.swap(a, b);
        self.positions.insert(self.entries[a].node, a);
        self.positions.insert(self.entries[b].node, b);
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.entries[pos] >= self.entries[parent] {
                break;
            }
            self.swap(pos, parent);
            pos = parent;
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.entries.len();
        loop {
            let left = 2 * pos + 1;
            let right = left + 1;
            let mut smallest = pos;
            if left < len && self.entries[left] < self.entries[smallest] {
                smallest = left;
            }
            if right < len && self.entries[right] < self.entries[smallest] {
                smallest = right;
            }
            if smallest == pos {
                break;
            }
            self.swap(pos, smallest);
            pos = smallest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path_planning::multi_root::node::{distance_cost, star_distance_cost};

    fn line_nodes(xs: &[f64]) -> Vec<Node> {
        let root = Node::new(0, Point::new(xs[0], 0.0), 0, None, 0.0, 0.0);
        let mut nodes = vec![root];
        for (i, &x) in xs.iter().enumerate().skip(1) {
            let d = (x - xs[0]).abs();
            let node = Node::new(i, Point::new(x, 0.0), 0, Some((0, &nodes[0])), d, d);
            nodes.push(node);
        }
        nodes
    }

    #[test]
    fn test_pop_order_follows_distance_to_goal() {
        let nodes = line_nodes(&[0.0, 3.0, 1.0, 2.0]);
        let mut heap = Heap::from_nodes(&nodes, Point::new(10.0, 0.0), distance_cost);

        let order: Vec<usize> = std::iter::from_fn(|| heap.pop()).collect();
        assert_eq!(order, vec![1, 3, 2, 0]);
        assert!(heap.is_empty());
    }

    #[test]
    fn test_ties_pop_in_insertion_order() {
        let nodes = line_nodes(&[0.0, 2.0, -2.0]);
        let mut heap = Heap::from_nodes(&nodes, Point::origin(), distance_cost);
        assert_eq!(heap.pop(), Some(0));
        assert_eq!(heap.pop(), Some(1));
        assert_eq!(heap.pop(), Some(2));
    }

    #[test]
    fn test_update_key_reorders() {
        let mut nodes = line_nodes(&[0.0, 4.0, 5.0]);
        let goal = Point::new(5.0, 0.0);
        let mut heap = Heap::from_nodes(&nodes, goal, star_distance_cost);
        assert_eq!(heap.top().map(|t| t.0), Some(2));

        // a much cheaper path to node 1 makes it the better candidate
        nodes[2].distance_to_root = 10.0;
        assert!(heap.update_key(&nodes, 2));
        assert_eq!(heap.top().map(|t| t.0), Some(1));
        assert!(!heap.update_key(&nodes, 7));
    }

    #[test]
    fn test_remove_and_reinsert() {
        let nodes = line_nodes(&[0.0, 1.0, 2.0, 3.0]);
        let mut heap = Heap::from_nodes(&nodes, Point::new(3.0, 0.0), distance_cost);
        assert!(heap.remove(3));
        assert!(!heap.contains(3));
        assert_eq!(heap.len(), 3);
        assert_eq!(heap.pop(), Some(2));

        heap.push(&nodes, 3);
        assert_eq!(heap.pop(), Some(3));
    }

    #[test]
    fn test_settle_drops_and_rekeys() {
        let mut nodes = line_nodes(&[0.0, 2.0, 1.0]);
        let mut heap = Heap::from_nodes(&nodes, Point::new(2.0, 0.0), star_distance_cost);

        for _ in 0..3 {
            nodes[1].record_miss(3);
        }
        let top = heap.settle(&nodes, |n| n.is_saturated(3));
        assert_eq!(top.map(|t| t.0), Some(2));
        assert!(!heap.contains(1));

        // stale key: the cost of node 2 has grown since it was pushed
        nodes[2].distance_to_root = 20.0;
        let (node, key) = heap.settle(&nodes, |n| n.is_saturated(3)).unwrap();
        assert_eq!(node, 0);
        assert!((key - 0.7 * 2.0).abs() < 1e-12);
        assert!(heap.contains(2));
    }
}
