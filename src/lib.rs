//! MultiRootPlanner - sampling-based planning between many roots at once
//!
//! This crate grows one rapidly exploring tree per root, links the trees
//! wherever they see each other and recovers the shortest path between every
//! pair of roots.

// Core modules
pub mod common;
pub mod utils;

// Algorithm modules
pub mod path_planning;

// Re-export common types for convenience
pub use common::{Point, Vector, Range, Path2D};
pub use common::{Environment, NearestNeighborIndex, TourSolver};
pub use common::{PlanningError, PlanningResult};
pub use path_planning::multi_root::{MultiRootPlanner, PlanningReport, Problem};
