//! Planning problem description and its validation

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::node::{distance_cost, star_distance_cost, CostFn};
use crate::common::{PlanningError, PlanningResult, Point, Range};

/// Misses after which a node is no longer expanded
pub const DEFAULT_MAX_MISSES: usize = 3;
/// Fraction of the larger root extent added to the automatic range
pub const AUTO_RANGE_MARGIN: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dimensions {
    D2,
    D3,
}

/// Frontier ordering: plain goal distance, or the A*-style blend with depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverType {
    Rrt,
    AStar,
}

impl SolverType {
    pub fn cost_fn(&self) -> CostFn {
        match self {
            SolverType::Rrt => distance_cost,
            SolverType::AStar => star_distance_cost,
        }
    }
}

/// Outputs that can be persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SaveOptions {
    /// Edges of every tree
    Tree,
    /// Links between mutually visible nodes of different trees
    Roadmap,
    /// Recovered root to root paths
    Plans,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    /// `x y` rows, segments separated by blank lines
    Map,
    /// Wavefront OBJ lines
    Obj,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileStruct {
    pub file_name: PathBuf,
    pub file_type: FileType,
}

impl FileStruct {
    pub fn new(file_name: impl Into<PathBuf>, file_type: FileType) -> Self {
        FileStruct {
            file_name: file_name.into(),
            file_type,
        }
    }
}

/// Multi-root planning problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Problem {
    pub repetition: usize,
    pub dimension: Dimensions,
    pub solver: SolverType,
    pub optimize: bool,
    pub roots: Vec<Point>,
    /// Extra root appended after `roots`
    pub goal: Option<Point>,
    pub auto_range: bool,
    /// Explicit range, overrides the environment's own when set
    pub range: Option<Range>,
    pub dist_tree: f64,
    pub sampling_dist: f64,
    pub collision_dist: f64,
    pub max_iterations: usize,
    pub priority_bias: f64,
    pub max_misses: usize,
    pub save_opt: Vec<SaveOptions>,
    pub file_names: BTreeMap<SaveOptions, FileStruct>,
    pub save_freq: BTreeMap<SaveOptions, usize>,
    pub id: String,
    pub seed: u64,
    /// Neighbours considered per tree when linking a new node
    pub connection_neighbors: usize,
}

impl Default for Problem {
    fn default() -> Self {
        Problem {
            repetition: 0,
            dimension: Dimensions::D2,
            solver: SolverType::Rrt,
            optimize: false,
            roots: Vec::new(),
            goal: None,
            auto_range: false,
            range: None,
            dist_tree: 2.0,
            sampling_dist: 1.0,
            collision_dist: 0.1,
            max_iterations: 10_000,
            priority_bias: 0.0,
            max_misses: DEFAULT_MAX_MISSES,
            save_opt: Vec::new(),
            file_names: BTreeMap::new(),
            save_freq: BTreeMap::new(),
            id: "Solver".to_string(),
            seed: 0,
            connection_neighbors: 5,
        }
    }
}

impl Problem {
    pub fn has_goal(&self) -> bool {
        self.goal.is_some()
    }

    pub fn num_roots(&self) -> usize {
        self.roots.len() + usize::from(self.has_goal())
    }

    /// Roots followed by the goal, in tree order
    pub fn all_roots(&self) -> Vec<Point> {
        let mut roots = self.roots.clone();
        roots.extend(self.goal);
        roots
    }

    /// Bounding box of every root grown by the expansion reach and a margin
    pub fn derived_range(&self) -> Option<Range> {
        let roots = self.all_roots();
        let tight = Range::around(roots.iter(), 0.0)?;
        let padding = self.dist_tree
            + self.sampling_dist
            + AUTO_RANGE_MARGIN * tight.width().max(tight.height());
        Range::around(roots.iter(), padding)
    }

    pub fn validate(&self) -> PlanningResult<()> {
        let invalid = |msg: String| -> PlanningResult<()> { Err(PlanningError::InvalidConfiguration(msg)) };

        if self.dimension != Dimensions::D2 {
            return invalid(format!("{:?} problems are not supported", self.dimension));
        }
        if self.num_roots() == 0 {
            return invalid("at least one root is required".to_string());
        }
        if let Some(p) = self.all_roots().iter().find(|p| !p.is_finite()) {
            return invalid(format!("root {:?} is not finite", p));
        }
        if !(self.sampling_dist.is_finite() && self.sampling_dist > 0.0) {
            return invalid(format!("sampling distance must be positive, got {}", self.sampling_dist));
        }
        if !(self.dist_tree.is_finite() && self.dist_tree > 0.0) {
            return invalid(format!("tree distance must be positive, got {}", self.dist_tree));
        }
        if !(self.collision_dist.is_finite() && self.collision_dist >= 0.0) {
            return invalid(format!("collision distance must not be negative, got {}", self.collision_dist));
        }
        if !(0.0..=1.0).contains(&self.priority_bias) {
            return invalid(format!("priority bias must lie in [0, 1], got {}", self.priority_bias));
        }
        if self.max_misses == 0 {
            return invalid("max misses must be at least 1".to_string());
        }
        if self.connection_neighbors == 0 {
            return invalid("connection neighbors must be at least 1".to_string());
        }
        if let Some(range) = self.range {
            if !range.is_valid() {
                return invalid(format!("range {:?} is empty or not finite", range));
            }
        }
        for opt in &self.save_opt {
            if !self.file_names.contains_key(opt) {
                return invalid(format!("no file name given for {:?}", opt));
            }
        }
        if let Some((opt, _)) = self.save_freq.iter().find(|(_, freq)| **freq == 0) {
            return invalid(format!("save frequency of {:?} must be positive", opt));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_roots() -> Problem {
        Problem {
            roots: vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)],
            ..Default::default()
        }
    }

    #[test]
    fn test_goal_is_an_extra_root() {
        let mut problem = two_roots();
        assert_eq!(problem.num_roots(), 2);
        problem.goal = Some(Point::new(5.0, 5.0));
        assert!(problem.has_goal());
        assert_eq!(problem.num_roots(), 3);
        assert_eq!(problem.all_roots()[2], Point::new(5.0, 5.0));
    }

    #[test]
    fn test_derived_range() {
        let problem = two_roots();
        // 2 + 1 + 10% of 10
        let range = problem.derived_range().unwrap();
        assert_eq!(range, Range::new(-4.0, 14.0, -4.0, 4.0));
        assert!(Problem::default().derived_range().is_none());
    }

    #[test]
    fn test_validate() {
        assert!(two_roots().validate().is_ok());
        assert!(Problem::default().validate().is_err());

        let bad_bias = Problem { priority_bias: 1.5, ..two_roots() };
        assert!(matches!(bad_bias.validate(), Err(PlanningError::InvalidConfiguration(_))));

        let bad_step = Problem { sampling_dist: 0.0, ..two_roots() };
        assert!(bad_step.validate().is_err());

        let three_d = Problem { dimension: Dimensions::D3, ..two_roots() };
        assert!(three_d.validate().is_err());

        let mut no_file = two_roots();
        no_file.save_opt.push(SaveOptions::Tree);
        assert!(no_file.validate().is_err());
        no_file
            .file_names
            .insert(SaveOptions::Tree, FileStruct::new("tree.txt", FileType::Map));
        assert!(no_file.validate().is_ok());
    }

    #[test]
    fn test_solver_cost_functions() {
        use crate::path_planning::multi_root::node::Node;

        let root = Node::new(0, Point::origin(), 0, None, 0.0, 0.0);
        let node = Node::new(1, Point::new(0.0, 2.0), 0, Some((0, &root)), 2.0, 2.0);
        let goal = Point::new(0.0, 6.0);
        assert_eq!((SolverType::Rrt.cost_fn())(&node, &goal), 4.0);
        assert!(((SolverType::AStar.cost_fn())(&node, &goal) - 3.4).abs() < 1e-12);
    }
}
