//! Common types, traits, and error definitions for multi_root_planner
//!
//! Geometry primitives, the collaborator interfaces the planner core talks
//! to, and the crate-wide error type.

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;
