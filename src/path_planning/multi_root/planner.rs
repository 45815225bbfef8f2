//! Expansion engine growing one tree per root until the roots are linked
//!
//! Each iteration picks a tree round-robin, draws a sample (uniformly or from
//! the tree's frontiers), steers towards it, inserts the new node and links
//! it with every visible node of the other trees.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Uniform};
use tracing::{debug, info, trace};

use super::node::{Node, NodeRef};
use super::output;
use super::pairwise::{DistanceHolder, PairwiseTable};
use super::problem::{Problem, SaveOptions};
use super::recovery::PathMatrix;
use super::tree::Forest;
use crate::common::{Environment, NearestNeighborIndex, PlanningError, PlanningResult, Point, Vector};
use crate::utils::RTreeIndex;

/// Largest heading perturbation of a frontier step, reached at saturation
pub const ANGLE_DISPERSION: f64 = 0.8;
/// Candidates closer than this fraction of the sampling distance to their own
/// tree are duplicates
pub const CROWDING_RATIO: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    Cancelled,
    MaxIterations,
    /// Every root reaches every other and no frontier is left
    Connected,
    /// Every node of every tree exhausted its misses
    Saturated,
    /// Every tree was skipped by tree selection
    Exhausted,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TerminationReason::Cancelled => "cancelled",
            TerminationReason::MaxIterations => "iteration limit reached",
            TerminationReason::Connected => "all roots connected",
            TerminationReason::Saturated => "all nodes saturated",
            TerminationReason::Exhausted => "no tree left to expand",
        };
        write!(f, "{}", s)
    }
}

/// First direct link between two roots
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionEvent {
    pub iteration: usize,
    pub i: usize,
    pub j: usize,
    pub distance: f64,
}

#[derive(Debug, Clone)]
pub struct PlanningReport {
    pub iterations: usize,
    pub termination: TerminationReason,
    pub connections: Vec<ConnectionEvent>,
    pub matrix: PathMatrix,
}

impl PlanningReport {
    pub fn first_connection(&self) -> Option<&ConnectionEvent> {
        self.connections.first()
    }
}

pub struct MultiRootPlanner<E: Environment, I: NearestNeighborIndex + Default = RTreeIndex> {
    problem: Problem,
    env: E,
    forest: Forest<I>,
    table: PairwiseTable,
    rng: StdRng,
    iteration: usize,
    next_tree: usize,
    cancel: Option<Arc<AtomicBool>>,
    connections: Vec<ConnectionEvent>,
    refining: bool,
}

impl<E: Environment, I: NearestNeighborIndex + Default> MultiRootPlanner<E, I> {
    /// Validate the problem, fit the environment range and plant the roots
    pub fn new(problem: Problem, mut env: E) -> PlanningResult<Self> {
        problem.validate()?;

        if problem.auto_range {
            if let Some(range) = problem.derived_range() {
                env.set_range(range);
            }
        } else if let Some(range) = problem.range {
            env.set_range(range);
        }
        let range = env.range();
        if !range.is_valid() {
            return Err(PlanningError::InvalidConfiguration(format!(
                "environment range {:?} is empty or not finite",
                range
            )));
        }

        let roots = problem.all_roots();
        if let Some((i, p)) = roots.iter().enumerate().find(|(_, p)| !env.is_valid(p)) {
            return Err(PlanningError::InvalidConfiguration(format!(
                "root {} at ({}, {}) is not a valid configuration",
                i, p.x, p.y
            )));
        }

        let forest = Forest::new(&roots, problem.solver)?;
        debug!(roots = roots.len(), ?range, "forest planted");

        Ok(MultiRootPlanner {
            table: PairwiseTable::new(roots.len()),
            rng: StdRng::seed_from_u64(problem.seed),
            problem,
            env,
            forest,
            iteration: 0,
            next_tree: 0,
            cancel: None,
            connections: Vec::new(),
            refining: false,
        })
    }

    /// Stop at the next iteration boundary once `flag` is set
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    pub fn environment(&self) -> &E {
        &self.env
    }

    pub fn forest(&self) -> &Forest<I> {
        &self.forest
    }

    pub fn forest_mut(&mut self) -> &mut Forest<I> {
        &mut self.forest
    }

    pub fn table(&self) -> &PairwiseTable {
        &self.table
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn connections(&self) -> &[ConnectionEvent] {
        &self.connections
    }

    /// Recompute every pairwise distance from the current tree costs
    pub fn update_pairwise(&mut self) {
        self.table.update_all(&self.forest);
    }

    /// Shortest root to root paths over the links found so far
    pub fn recover(&self) -> PathMatrix {
        PathMatrix::recover(&self.forest, &self.table)
    }

    /// Run until a termination condition holds
    pub fn solve(&mut self) -> PlanningResult<PlanningReport> {
        info!(
            id = %self.problem.id,
            repetition = self.problem.repetition,
            roots = self.forest.len(),
            max_iterations = self.problem.max_iterations,
            "multi-root planning started"
        );

        let termination = loop {
            if let Some(reason) = self.step()? {
                break reason;
            }
        };

        let matrix = self.recover();
        info!(
            iterations = self.iteration,
            nodes = self.forest.num_nodes(),
            links = self.table.num_links(),
            %termination,
            "multi-root planning finished"
        );
        if !matrix.is_complete() {
            debug!(missing = ?self.table.missing_pairs(), "roots left unconnected");
        }

        Ok(PlanningReport {
            iterations: self.iteration,
            termination,
            connections: self.connections.clone(),
            matrix,
        })
    }

    /// One iteration. Returns the termination reason instead of expanding
    /// once the run is over.
    pub fn step(&mut self) -> PlanningResult<Option<TerminationReason>> {
        if let Some(reason) = self.termination() {
            return Ok(Some(reason));
        }

        if self.problem.optimize && !self.refining && self.forest.fully_connected() {
            self.refining = true;
            for t in 0..self.forest.len() {
                self.forest.tree_mut(t).enable_frontier();
            }
            debug!(iteration = self.iteration, "all roots connected, refining");
        }

        let tree = match self.select_tree() {
            Some(tree) => tree,
            None => return Ok(Some(TerminationReason::Exhausted)),
        };
        trace!(iteration = self.iteration, tree, "expanding");
        self.expand(tree)?;
        self.iteration += 1;
        self.snapshot()?;
        Ok(None)
    }

    fn termination(&self) -> Option<TerminationReason> {
        if self
            .cancel
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
        {
            return Some(TerminationReason::Cancelled);
        }
        if self.iteration >= self.problem.max_iterations {
            return Some(TerminationReason::MaxIterations);
        }
        if !self.problem.optimize
            && self.table.is_complete()
            && self.forest.trees().iter().all(|t| t.empty_frontiers())
        {
            return Some(TerminationReason::Connected);
        }
        if self.forest.all_saturated() {
            return Some(TerminationReason::Saturated);
        }
        None
    }

    fn select_tree(&mut self) -> Option<usize> {
        let n = self.forest.len();
        let all_connected = self.forest.fully_connected();
        for offset in 0..n {
            let t = (self.next_tree + offset) % n;
            if self.forest.tree(t).empty_frontiers() && all_connected {
                continue;
            }
            self.next_tree = (t + 1) % n;
            return Some(t);
        }
        None
    }

    fn expand(&mut self, t: usize) -> PlanningResult<()> {
        let max_misses = self.problem.max_misses;
        let roll: f64 = self.rng.gen();
        let wants_frontier =
            self.forest.tree(t).force_pending() || roll < self.problem.priority_bias;

        if wants_frontier {
            if let Some((frontier, from)) = self.forest.tree_mut(t).pop_frontier(max_misses) {
                let target = self.forest.tree(t).frontiers()[frontier].goal();
                let candidate = self.frontier_candidate(t, from, &target);
                self.attempt(t, from, candidate, true)?;
                self.forest.tree_mut(t).requeue(frontier, from, max_misses);
                return Ok(());
            }
            self.forest.tree_mut(t).clear_force();
        }

        let sample = self.env.sample_uniform(&mut self.rng);
        if !self.env.range().contains(&sample) {
            trace!(x = sample.x, y = sample.y, "sample outside range discarded");
            return Ok(());
        }
        let (nearest, _) = self
            .forest
            .tree(t)
            .nearest(&sample)
            .ok_or_else(|| PlanningError::index(t, self.iteration, "nearest lookup on an empty index"))?;
        let from = self.forest.tree(t).node(nearest).position;
        let candidate = from.get_state_in_distance(&sample, self.problem.sampling_dist);
        self.attempt(t, nearest, candidate, false)?;
        Ok(())
    }

    /// Step from `from` towards `target`; the heading spreads as the node
    /// collects misses
    fn frontier_candidate(&mut self, t: usize, from: usize, target: &Point) -> Point {
        let node = self.forest.tree(t).node(from);
        let position = node.position;
        let misses = node.misses();

        let spread = ANGLE_DISPERSION * misses as f64 / self.problem.max_misses as f64;
        let jitter = Uniform::new_inclusive(-1.0, 1.0).sample(&mut self.rng) * spread;
        if misses == 0 && position.distance(target) <= self.problem.sampling_dist {
            return *target;
        }
        let heading = Vector::from_points(&position, target).direction() + jitter;
        position + Vector::from_polar(self.problem.sampling_dist, heading)
    }

    /// Try to grow tree `t` from node `from` to `candidate`. Returns the new
    /// slot, or `None` when the attempt counted as a miss.
    fn attempt(&mut self, t: usize, from: usize, candidate: Point, from_frontier: bool) -> PlanningResult<Option<usize>> {
        let max_misses = self.problem.max_misses;
        let from_position = self.forest.tree(t).node(from).position;

        let collides = !self.env.is_valid(&candidate) || !self.env.is_valid_edge(&from_position, &candidate);
        let crowded = !collides
            && self
                .forest
                .tree(t)
                .nearest(&candidate)
                .map_or(false, |(_, d)| d < CROWDING_RATIO * self.problem.sampling_dist);
        if collides || crowded {
            if self.forest.tree_mut(t).record_miss(from, max_misses) {
                trace!(tree = t, node = from, "node saturated");
            }
            return Ok(None);
        }

        let radius = self.problem.dist_tree;
        let k = self.problem.connection_neighbors;
        let (parent, distance) = if self.problem.optimize {
            self.forest.tree(t).choose_parent(&self.env, from, &candidate, radius, k)
        } else {
            (from, from_position.distance(&candidate))
        };

        let id = self.forest.next_node_id();
        let tree = self.forest.tree_mut(t);
        let parent_node = tree.node(parent);
        let mut node = Node::new(
            id,
            candidate,
            t,
            Some((parent, parent_node)),
            distance,
            parent_node.distance_to_root + distance,
        );
        node.force_children = from_frontier;
        let slot = tree.insert(node, self.iteration, from_frontier)?;

        if self.problem.optimize {
            let changed = self.forest.tree_mut(t).rewire(&self.env, slot, radius, k);
            if !changed.is_empty() {
                self.table.update_all(&self.forest);
            }
        }

        self.connect(NodeRef::new(t, slot));
        Ok(Some(slot))
    }

    /// Link a fresh node with the visible nodes of every other tree
    fn connect(&mut self, new: NodeRef) {
        let position = self.forest.node(new).position;
        let k = self.problem.connection_neighbors;
        let mut linked = false;

        for other in 0..self.forest.len() {
            if other == new.tree {
                continue;
            }
            let near = self.forest.tree(other).knn_within(&position, k, self.problem.dist_tree);
            for (index, d) in near {
                let neighbor = NodeRef::new(other, index);
                let neighbor_position = self.forest.node(neighbor).position;
                if !self.env.is_valid_edge(&position, &neighbor_position) {
                    continue;
                }
                self.forest.node_mut(new).visible_nodes.insert(neighbor, d);
                self.forest.node_mut(neighbor).visible_nodes.insert(new, d);

                let first = !self.table.get(new.tree, other).is_direct();
                let holder = DistanceHolder::new(&self.forest, new, neighbor);
                let distance = holder.distance;
                if self.table.update(new.tree, other, holder) {
                    linked = true;
                    if first {
                        debug!(iteration = self.iteration, i = new.tree, j = other, distance, "roots linked");
                        self.connections.push(ConnectionEvent {
                            iteration: self.iteration,
                            i: new.tree.min(other),
                            j: new.tree.max(other),
                            distance,
                        });
                    } else {
                        trace!(i = new.tree, j = other, distance, "shorter link");
                    }
                }

                self.forest.merge(new.tree, other);
            }
        }

        if linked {
            for (i, j) in self.table.compose(&self.forest) {
                debug!(
                    iteration = self.iteration,
                    i,
                    j,
                    distance = self.table.get(i, j).distance,
                    "roots joined through other roots"
                );
            }
        }
    }

    fn snapshot(&self) -> PlanningResult<()> {
        for opt in &self.problem.save_opt {
            let due = self
                .problem
                .save_freq
                .get(opt)
                .map_or(false, |&freq| self.iteration % freq == 0);
            if due {
                let prefix = format!("iter_{}_", self.iteration);
                self.save(*opt, Some(&prefix))?;
            }
        }
        Ok(())
    }

    /// Write every selected output under its configured file name
    pub fn save_results(&self) -> PlanningResult<()> {
        for opt in &self.problem.save_opt {
            self.save(*opt, None)?;
        }
        Ok(())
    }

    fn save(&self, opt: SaveOptions, prefix: Option<&str>) -> PlanningResult<()> {
        let file = self.problem.file_names.get(&opt).ok_or_else(|| {
            PlanningError::InvalidConfiguration(format!("no file name given for {:?}", opt))
        })?;
        let path = match prefix {
            Some(prefix) => output::prefix_file_name(&file.file_name, prefix),
            None => file.file_name.clone(),
        };
        debug!(?opt, path = %path.display(), "saving");

        match opt {
            SaveOptions::Tree => output::save_trees(&path, file.file_type, &self.forest),
            SaveOptions::Roadmap => output::save_roadmap(&path, file.file_type, &self.forest),
            SaveOptions::Plans => output::save_plans(&path, file.file_type, &self.forest, &self.recover()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Range;
    use crate::path_planning::environment::EmptyEnvironment;

    fn planner(roots: Vec<Point>, max_iterations: usize) -> MultiRootPlanner<EmptyEnvironment> {
        let problem = Problem {
            roots,
            max_iterations,
            priority_bias: 1.0,
            ..Default::default()
        };
        let env = EmptyEnvironment::new(Range::new(-5.0, 15.0, -5.0, 5.0));
        MultiRootPlanner::new(problem, env).unwrap()
    }

    #[test]
    fn test_root_outside_range_is_rejected() {
        let problem = Problem {
            roots: vec![Point::new(50.0, 0.0)],
            ..Default::default()
        };
        let env = EmptyEnvironment::new(Range::new(0.0, 1.0, 0.0, 1.0));
        let err = MultiRootPlanner::<_, RTreeIndex>::new(problem, env).err().unwrap();
        assert!(matches!(err, PlanningError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_auto_range_replaces_environment_range() {
        let problem = Problem {
            roots: vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)],
            auto_range: true,
            ..Default::default()
        };
        let env = EmptyEnvironment::new(Range::new(0.0, 1.0, 0.0, 1.0));
        let planner: MultiRootPlanner<_> = MultiRootPlanner::new(problem, env).unwrap();
        assert_eq!(planner.environment().range(), Range::new(-4.0, 14.0, -4.0, 4.0));
    }

    #[test]
    fn test_frontier_chase_goes_straight() {
        let mut planner = planner(vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)], 4);
        let report = planner.solve().unwrap();
        assert_eq!(report.termination, TerminationReason::MaxIterations);

        let xs: Vec<f64> = planner.forest().tree(0).nodes().iter().map(|n| n.position.x).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0]);
        assert!(planner.forest().tree(0).node(1).force_children);
        assert_eq!(planner.forest().tree(1).len(), 3);
    }

    #[test]
    fn test_cancelled_before_first_iteration() {
        let flag = Arc::new(AtomicBool::new(true));
        let mut planner = planner(vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)], 100)
            .with_cancel_flag(flag.clone());
        let report = planner.solve().unwrap();
        assert_eq!(report.termination, TerminationReason::Cancelled);
        assert_eq!(report.iterations, 0);

        flag.store(false, Ordering::Relaxed);
        assert_eq!(planner.step().unwrap(), None);
        assert_eq!(planner.iteration(), 1);
    }

    #[test]
    fn test_crowded_candidate_is_a_miss() {
        let mut planner = planner(vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)], 10);
        let result = planner.attempt(0, 0, Point::new(0.2, 0.0), false).unwrap();
        assert_eq!(result, None);
        assert_eq!(planner.forest().tree(0).root().misses(), 1);
        assert_eq!(planner.forest().tree(0).len(), 1);
    }
}
