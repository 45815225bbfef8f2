//! Utility modules for multi_root_planner

pub mod spatial_index;
pub mod visualization;

pub use spatial_index::RTreeIndex;
pub use visualization::{colors, PathStyle, PointStyle, Visualizer};
