//! Search trees grown from each root and the forest that owns them
//!
//! Every tree keeps its nodes in an arena, a nearest-neighbour index over
//! their positions (same order as the arena) and one frontier heap per
//! other root.

use tracing::{debug, trace};

use super::heap::Heap;
use super::node::{Node, NodeRef};
use super::problem::SolverType;
use crate::common::{Environment, NearestNeighborIndex, PlanningError, PlanningResult, Point, TOLERANCE};
use crate::utils::RTreeIndex;

#[derive(Debug, Clone)]
pub struct Tree<I = RTreeIndex> {
    id: usize,
    nodes: Vec<Node>,
    index: I,
    frontiers: Vec<Heap>,
    /// Root each frontier chases, parallel to `frontiers`
    targets: Vec<usize>,
    filtered: Vec<bool>,
    /// Trees merged into this one while it was the component representative
    pub eaten: Vec<usize>,
    expanded_root: usize,
    /// Last insertion came from a frontier step
    force_pending: bool,
    saturated: usize,
}

impl<I: NearestNeighborIndex + Default> Tree<I> {
    /// Tree holding only its root node
    pub fn new(id: usize, node_id: usize, root: Point) -> PlanningResult<Self> {
        let mut index = I::default();
        index
            .add(&[root])
            .and_then(|_| index.build())
            .map_err(|reason| PlanningError::index(id, 0, reason))?;

        Ok(Tree {
            id,
            nodes: vec![Node::new(node_id, root, id, None, 0.0, 0.0)],
            index,
            frontiers: Vec::new(),
            targets: Vec::new(),
            filtered: Vec::new(),
            eaten: Vec::new(),
            expanded_root: id,
            force_pending: false,
            saturated: 0,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    pub fn node_mut(&mut self, index: usize) -> &mut Node {
        &mut self.nodes[index]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn index_len(&self) -> usize {
        self.index.len()
    }

    pub fn expanded_root(&self) -> usize {
        self.expanded_root
    }

    pub fn force_pending(&self) -> bool {
        self.force_pending
    }

    pub fn clear_force(&mut self) {
        self.force_pending = false;
    }

    /// Start chasing root `target` located at `goal`
    pub fn add_frontier(&mut self, target: usize, goal: Point, solver: SolverType) {
        self.frontiers
            .push(Heap::from_nodes(&self.nodes, goal, solver.cost_fn()));
        self.targets.push(target);
        self.filtered.push(false);
    }

    pub fn frontiers(&self) -> &[Heap] {
        &self.frontiers
    }

    pub fn frontier_targets(&self) -> &[usize] {
        &self.targets
    }

    pub fn is_filtered(&self, frontier: usize) -> bool {
        self.filtered[frontier]
    }

    /// Suspend every frontier whose target satisfies `connected`
    pub fn filter_frontiers<F>(&mut self, connected: F)
    where
        F: Fn(usize) -> bool,
    {
        for (f, &target) in self.targets.iter().enumerate() {
            if !self.filtered[f] && connected(target) {
                trace!(tree = self.id, target, "frontier filtered");
                self.filtered[f] = true;
            }
        }
    }

    /// No frontier can be popped: every heap is empty or every frontier is
    /// filtered. A tree without frontiers is trivially empty.
    pub fn empty_frontiers(&self) -> bool {
        let all_empty = self.frontiers.iter().all(|h| h.is_empty());
        let all_filtered = self.filtered.iter().all(|&f| f);
        all_empty || all_filtered
    }

    /// Lift every filter so already connected roots are chased again
    pub fn enable_frontier(&mut self) {
        for f in self.filtered.iter_mut() {
            *f = false;
        }
    }

    /// Pop the cheapest non-saturated node across active frontiers. Equal
    /// keys go to the frontier added first.
    pub fn pop_frontier(&mut self, max_misses: usize) -> Option<(usize, usize)> {
        let mut best: Option<(usize, f64)> = None;
        for f in 0..self.frontiers.len() {
            if self.filtered[f] {
                continue;
            }
            let nodes = &self.nodes;
            let top = self.frontiers[f].settle(nodes, |n| n.is_saturated(max_misses));
            if let Some((_, key)) = top {
                if best.map_or(true, |(_, k)| key < k) {
                    best = Some((f, key));
                }
            }
        }

        let (frontier, _) = best?;
        let node = self.frontiers[frontier].pop()?;
        Some((frontier, node))
    }

    /// Put a node back into one frontier after expanding from it
    pub fn requeue(&mut self, frontier: usize, node: usize, max_misses: usize) {
        if !self.nodes[node].is_saturated(max_misses) {
            self.frontiers[frontier].push(&self.nodes, node);
        }
    }

    pub fn nearest(&self, p: &Point) -> Option<(usize, f64)> {
        self.index.nearest(p)
    }

    pub fn knn_within(&self, p: &Point, k: usize, radius: f64) -> Vec<(usize, f64)> {
        self.index.knn_within(p, k, radius)
    }

    /// Append a node; returns its slot. The node enters the index and every
    /// frontier.
    pub fn insert(&mut self, node: Node, iteration: usize, from_frontier: bool) -> PlanningResult<usize> {
        self.index
            .add(&[node.position])
            .map_err(|reason| PlanningError::index(self.id, iteration, reason))?;

        let slot = self.nodes.len();
        if let Some(parent) = node.closest {
            self.nodes[parent].children.push(slot);
        }
        self.nodes.push(node);
        for heap in self.frontiers.iter_mut() {
            heap.push(&self.nodes, slot);
        }
        self.force_pending = from_frontier;
        Ok(slot)
    }

    /// Count a failed expansion from `node`. Returns `true` when it became
    /// saturated.
    pub fn record_miss(&mut self, node: usize, max_misses: usize) -> bool {
        self.force_pending = false;
        let saturated = self.nodes[node].record_miss(max_misses);
        if saturated {
            self.saturated += 1;
        }
        saturated
    }

    pub fn saturated_count(&self) -> usize {
        self.saturated
    }

    pub fn all_saturated(&self) -> bool {
        self.saturated == self.nodes.len()
    }

    fn set_expanded_root(&mut self, root: usize) {
        self.expanded_root = root;
        for node in self.nodes.iter_mut() {
            node.expanded_root = root;
        }
    }

    /// Slots from `node` up to the root
    pub fn path_to_root(&self, node: usize) -> Vec<usize> {
        let mut path = vec![node];
        let mut current = node;
        while let Some(parent) = self.nodes[current].closest {
            path.push(parent);
            current = parent;
        }
        path
    }

    /// Cheapest parent for a configuration about to be inserted. Starts from
    /// `nearest` and considers every node within `radius`.
    pub fn choose_parent<E: Environment>(
        &self,
        env: &E,
        nearest: usize,
        candidate: &Point,
        radius: f64,
        k: usize,
    ) -> (usize, f64) {
        let d = self.nodes[nearest].position.distance(candidate);
        let mut best = (nearest, d);
        let mut best_cost = self.nodes[nearest].distance_to_root + d;

        for (i, d) in self.index.knn_within(candidate, k, radius) {
            if i == nearest {
                continue;
            }
            let cost = self.nodes[i].distance_to_root + d;
            if cost + TOLERANCE < best_cost && env.is_valid_edge(&self.nodes[i].position, candidate) {
                best = (i, d);
                best_cost = cost;
            }
        }
        best
    }

    /// Reroute neighbours of `new` through it when that shortens their path.
    /// Returns every slot whose distance to root changed.
    pub fn rewire<E: Environment>(&mut self, env: &E, new: usize, radius: f64, k: usize) -> Vec<usize> {
        let position = self.nodes[new].position;
        let parent = self.nodes[new].closest;
        let mut changed = Vec::new();

        for (i, d) in self.index.knn_within(&position, k, radius) {
            if i == new || Some(i) == parent || self.nodes[i].closest.is_none() {
                continue;
            }
            let cost = self.nodes[new].distance_to_root + d;
            if cost + TOLERANCE < self.nodes[i].distance_to_root
                && env.is_valid_edge(&position, &self.nodes[i].position)
            {
                trace!(tree = self.id, node = i, via = new, cost, "rewire");
                self.reparent(i, new, d);
                changed.extend(self.propagate_cost_to_leaves(i));
            }
        }

        if !changed.is_empty() {
            for heap in self.frontiers.iter_mut() {
                for &i in &changed {
                    heap.update_key(&self.nodes, i);
                }
            }
        }
        changed
    }

    fn reparent(&mut self, child: usize, parent: usize, distance: f64) {
        if let Some(old) = self.nodes[child].closest {
            self.nodes[old].children.retain(|&c| c != child);
        }
        self.nodes[child].closest = Some(parent);
        self.nodes[child].distance_to_closest = distance;
        self.nodes[parent].children.push(child);
    }

    fn propagate_cost_to_leaves(&mut self, start: usize) -> Vec<usize> {
        let mut updated = Vec::new();
        let mut stack = vec![start];
        while let Some(i) = stack.pop() {
            if let Some(p) = self.nodes[i].closest {
                self.nodes[i].distance_to_root =
                    self.nodes[p].distance_to_root + self.nodes[i].distance_to_closest;
            }
            updated.push(i);
            stack.extend(self.nodes[i].children.iter().copied());
        }
        updated
    }

    /// Recompute every frontier key, used after distances were changed
    /// from outside
    pub fn refresh_frontiers(&mut self) {
        for heap in self.frontiers.iter_mut() {
            for i in 0..self.nodes.len() {
                heap.update_key(&self.nodes, i);
            }
        }
    }
}

/// All trees of a planning run plus the run-wide node id counter
#[derive(Debug, Clone)]
pub struct Forest<I = RTreeIndex> {
    trees: Vec<Tree<I>>,
    next_id: usize,
}

impl<I: NearestNeighborIndex + Default> Forest<I> {
    /// One tree per root; each tree gets a frontier towards every other root
    /// in root order.
    pub fn new(roots: &[Point], solver: SolverType) -> PlanningResult<Self> {
        let mut trees = Vec::with_capacity(roots.len());
        for (i, &root) in roots.iter().enumerate() {
            trees.push(Tree::new(i, i, root)?);
        }
        for tree in trees.iter_mut() {
            for (j, &root) in roots.iter().enumerate() {
                if j != tree.id() {
                    tree.add_frontier(j, root, solver);
                }
            }
        }

        Ok(Forest {
            trees,
            next_id: roots.len(),
        })
    }

    pub fn trees(&self) -> &[Tree<I>] {
        &self.trees
    }

    pub fn tree(&self, id: usize) -> &Tree<I> {
        &self.trees[id]
    }

    pub fn tree_mut(&mut self, id: usize) -> &mut Tree<I> {
        &mut self.trees[id]
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    pub fn num_nodes(&self) -> usize {
        self.trees.iter().map(|t| t.len()).sum()
    }

    pub fn node(&self, r: NodeRef) -> &Node {
        self.trees[r.tree].node(r.index)
    }

    pub fn node_mut(&mut self, r: NodeRef) -> &mut Node {
        self.trees[r.tree].node_mut(r.index)
    }

    /// Take the next run-wide node id
    pub fn next_node_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn connected(&self, a: usize, b: usize) -> bool {
        self.trees[a].expanded_root == self.trees[b].expanded_root
    }

    pub fn fully_connected(&self) -> bool {
        match self.trees.first() {
            Some(first) => self.trees.iter().all(|t| t.expanded_root == first.expanded_root),
            None => true,
        }
    }

    /// Trees in the same component as `tree`, including itself
    pub fn component(&self, tree: usize) -> Vec<usize> {
        let root = self.trees[tree].expanded_root;
        (0..self.trees.len())
            .filter(|&t| self.trees[t].expanded_root == root)
            .collect()
    }

    pub fn all_saturated(&self) -> bool {
        self.trees.iter().all(|t| t.all_saturated())
    }

    /// Join the components of `a` and `b`. The lower representative absorbs
    /// the other; returns `(kept, eaten)` or `None` if already joined.
    pub fn merge(&mut self, a: usize, b: usize) -> Option<(usize, usize)> {
        let ra = self.trees[a].expanded_root;
        let rb = self.trees[b].expanded_root;
        if ra == rb {
            return None;
        }
        let (kept, eaten) = (ra.min(rb), ra.max(rb));

        for tree in self.trees.iter_mut() {
            if tree.expanded_root == eaten {
                tree.set_expanded_root(kept);
            }
        }
        self.trees[kept].eaten.push(eaten);

        let roots: Vec<usize> = self.trees.iter().map(|t| t.expanded_root).collect();
        for tree in self.trees.iter_mut() {
            let own = tree.expanded_root;
            tree.filter_frontiers(|target| roots[target] == own);
        }

        debug!(kept, eaten, "components merged");
        Some((kept, eaten))
    }

    /// Nodes from `r` back to its tree root
    pub fn path_to_root(&self, r: NodeRef) -> Vec<NodeRef> {
        self.trees[r.tree]
            .path_to_root(r.index)
            .into_iter()
            .map(|index| NodeRef::new(r.tree, index))
            .collect()
    }
}
