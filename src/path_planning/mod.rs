// Path Planning algorithms module

pub mod environment;
pub mod multi_root;

pub use environment::*;
pub use multi_root::{MultiRootPlanner, PlanningReport, Problem, TerminationReason};
