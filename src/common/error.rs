//! Error types for multi_root_planner

use thiserror::Error;

/// Main error type for the planner
///
/// Only conditions that invalidate a run are represented here. Collision
/// misses, duplicate samples and filtered frontiers stay local to the
/// expansion loop and never surface as errors.
#[derive(Debug, Error)]
pub enum PlanningError {
    /// The problem description cannot be planned (bad range, no roots, ...)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// A collaborator failed to parse its input
    #[error("Parse error: {0}")]
    Parse(String),
    /// The spatial index of a tree could not be built or extended
    #[error("Index error in tree {tree} at iteration {iteration}: {reason}")]
    Index {
        tree: usize,
        iteration: usize,
        reason: String,
    },
    /// I/O error while writing outputs
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Visualization error
    #[error("Visualization error: {0}")]
    Visualization(String),
}

impl PlanningError {
    /// Attach the tree and iteration to an index failure reported by a
    /// spatial index, which knows neither.
    pub fn index(tree: usize, iteration: usize, reason: impl Into<String>) -> Self {
        PlanningError::Index {
            tree,
            iteration,
            reason: reason.into(),
        }
    }
}

/// Result type alias for planner operations
pub type PlanningResult<T> = Result<T, PlanningError>;
