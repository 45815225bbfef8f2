//! Multi-Root Planner Module
//!
//! Grows one rapidly exploring tree from every root at once. Trees chase each
//! other through frontier heaps, and every collision-free link between two
//! trees updates a symmetric table of the best direct connection per root
//! pair. The shortest root to root paths recovered from that table feed a
//! downstream tour solver.
//!
//! # Components
//!
//! - `node`: arena node, node references and frontier cost functions
//! - `heap`: indexed min-heap backing the frontiers
//! - `tree`: per-root tree and the forest owning all of them
//! - `pairwise`: symmetric connection table
//! - `problem`: problem description and validation
//! - `planner`: the expansion engine
//! - `recovery`: shortest paths over the root graph and a reference tour
//! - `output`: writing trees, roadmaps and plans to disk
//!
//! # Example
//!
//! ```no_run
//! use multi_root_planner::common::{Point, Range};
//! use multi_root_planner::path_planning::environment::EmptyEnvironment;
//! use multi_root_planner::path_planning::multi_root::{MultiRootPlanner, Problem};
//!
//! let problem = Problem {
//!     roots: vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)],
//!     priority_bias: 0.5,
//!     ..Default::default()
//! };
//! let env = EmptyEnvironment::new(Range::new(-5.0, 15.0, -5.0, 5.0));
//!
//! let mut planner: MultiRootPlanner<_> = MultiRootPlanner::new(problem, env).unwrap();
//! let report = planner.solve().unwrap();
//! println!("0 -> 1: {}", report.matrix.distance(0, 1));
//! ```

pub mod heap;
pub mod node;
pub mod output;
pub mod pairwise;
pub mod planner;
pub mod problem;
pub mod recovery;
pub mod tree;

pub use heap::Heap;
pub use node::{distance_cost, star_distance_cost, CostFn, Node, NodeRef};
pub use pairwise::{DistanceHolder, PairwiseTable, SymmetricMatrix};
pub use planner::{ConnectionEvent, MultiRootPlanner, PlanningReport, TerminationReason};
pub use problem::{Dimensions, FileStruct, FileType, Problem, SaveOptions, SolverType};
pub use recovery::{tour_length, NearestNeighborTour, PathMatrix, RootPath};
pub use tree::{Forest, Tree};
