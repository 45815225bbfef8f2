//! Interfaces to the collaborators of the planner core

use nalgebra::DMatrix;
use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::common::types::*;

/// Obstacle geometry and collision queries
pub trait Environment {
    /// Configuration lies inside the range and outside every obstacle
    fn is_valid(&self, p: &Point) -> bool;

    /// Straight segment between `a` and `b` is collision free
    fn is_valid_edge(&self, a: &Point, b: &Point) -> bool;

    /// Bounds of the configuration space
    fn range(&self) -> Range;

    /// Replace the bounds, used when the range is derived from the roots
    fn set_range(&mut self, range: Range);

    /// Uniform sample over [`Environment::range`]
    fn sample_uniform<R: Rng + ?Sized>(&self, rng: &mut R) -> Point {
        let range = self.range();
        let x = Uniform::new_inclusive(range.min_x, range.max_x).sample(rng);
        let y = Uniform::new_inclusive(range.min_y, range.max_y).sample(rng);
        Point::new(x, y)
    }
}

/// k-nearest-neighbour index over a growing set of points
///
/// Returned indices refer to insertion order. Errors are plain messages;
/// the owner adds tree and iteration context.
pub trait NearestNeighborIndex {
    /// Reconstruct the index over every point inserted so far
    fn build(&mut self) -> Result<(), String>;

    /// Insert points, rebuilding only when the implementation needs to
    fn add(&mut self, points: &[Point]) -> Result<(), String>;

    /// Up to `k` nearest points as `(indices, squared distances)`, closest first
    fn knn_search(&self, query: &Point, k: usize) -> (Vec<usize>, Vec<f64>);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nearest point, if any
    fn nearest(&self, query: &Point) -> Option<(usize, f64)> {
        let (indices, dists) = self.knn_search(query, 1);
        indices.first().map(|&i| (i, dists[0].sqrt()))
    }

    /// Up to `k` nearest points no further than `radius`, as
    /// `(index, distance)` pairs
    fn knn_within(&self, query: &Point, k: usize, radius: f64) -> Vec<(usize, f64)> {
        let (indices, dists) = self.knn_search(query, k);
        let limit = radius * radius + TOLERANCE;
        indices
            .into_iter()
            .zip(dists)
            .filter(|&(_, d2)| d2 <= limit)
            .map(|(i, d2)| (i, d2.sqrt()))
            .collect()
    }
}

/// Orders roots given the recovered inter-root distance matrix
///
/// The planner never calls this; it consumes
/// `PathMatrix::distance_matrix`.
pub trait TourSolver {
    fn solve(&self, distances: &DMatrix<f64>) -> Vec<usize>;
}
