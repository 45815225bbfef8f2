//! R-tree backed [`NearestNeighborIndex`]
//!
//! Every entry carries its insertion index, so query results refer straight
//! back into the owning tree's node arena. Incremental `add` inserts into the
//! R-tree; `build` bulk loads it from scratch.

use ordered_float::OrderedFloat;
use rstar::primitives::GeomWithData;
use rstar::RTree;

use crate::common::{NearestNeighborIndex, Point};

type Entry = GeomWithData<[f64; 2], usize>;

#[derive(Debug, Clone)]
pub struct RTreeIndex {
    tree: RTree<Entry>,
    points: Vec<Point>,
}

impl Default for RTreeIndex {
    fn default() -> Self {
        RTreeIndex {
            tree: RTree::new(),
            points: Vec::new(),
        }
    }
}

impl RTreeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index over `points`, bulk loaded immediately
    pub fn from_points(points: Vec<Point>) -> Result<Self, String> {
        let mut index = RTreeIndex {
            tree: RTree::new(),
            points,
        };
        index.build()?;
        Ok(index)
    }

    pub fn point(&self, index: usize) -> &Point {
        &self.points[index]
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    fn entry(p: &Point, index: usize) -> Entry {
        GeomWithData::new([p.x, p.y], index)
    }

    fn check_finite(points: &[Point], offset: usize) -> Result<(), String> {
        match points.iter().position(|p| !p.is_finite()) {
            Some(i) => Err(format!("point {} has a non-finite coordinate", offset + i)),
            None => Ok(()),
        }
    }
}

impl NearestNeighborIndex for RTreeIndex {
    fn build(&mut self) -> Result<(), String> {
        Self::check_finite(&self.points, 0)?;
        let entries = self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| Self::entry(p, i))
            .collect();
        self.tree = RTree::bulk_load(entries);
        Ok(())
    }

    fn add(&mut self, points: &[Point]) -> Result<(), String> {
        Self::check_finite(points, self.points.len())?;
        for p in points {
            let index = self.points.len();
            self.tree.insert(Self::entry(p, index));
            self.points.push(*p);
        }
        Ok(())
    }

    /// Equal distances are ordered by insertion index, so results do not
    /// depend on the R-tree's internal layout.
    fn knn_search(&self, query: &Point, k: usize) -> (Vec<usize>, Vec<f64>) {
        if k == 0 {
            return (Vec::new(), Vec::new());
        }

        let mut found: Vec<(OrderedFloat<f64>, usize)> = Vec::with_capacity(k + 1);
        for (entry, d2) in self.tree.nearest_neighbor_iter_with_distance_2(&[query.x, query.y]) {
            // drain ties with the k-th neighbour before cutting
            if found.len() >= k && found.last().map_or(false, |&(last, _)| d2 > last.0) {
                break;
            }
            found.push((OrderedFloat(d2), entry.data));
        }
        found.sort_unstable();
        found.truncate(k);

        found.into_iter().map(|(d2, i)| (i, d2.0)).unzip()
    }

    fn len(&self) -> usize {
        self.points.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn brute_force(points: &[Point], query: &Point, k: usize) -> Vec<usize> {
        let mut all: Vec<(f64, usize)> = points
            .iter()
            .enumerate()
            .map(|(i, p)| (p.distance_squared(query), i))
            .collect();
        all.sort_by(|a, b| a.partial_cmp(b).unwrap());
        all.into_iter().take(k).map(|(_, i)| i).collect()
    }

    fn random_points(rng: &mut StdRng, n: usize) -> Vec<Point> {
        (0..n)
            .map(|_| Point::new(rng.gen_range(-50.0..50.0), rng.gen_range(-50.0..50.0)))
            .collect()
    }

    #[test]
    fn test_knn_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(7);
        let points = random_points(&mut rng, 500);
        let index = RTreeIndex::from_points(points.clone()).unwrap();

        for _ in 0..50 {
            let query = Point::new(rng.gen_range(-60.0..60.0), rng.gen_range(-60.0..60.0));
            let (indices, dists) = index.knn_search(&query, 5);
            assert_eq!(indices, brute_force(&points, &query, 5));
            assert!(dists.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_incremental_add_keeps_results_exact() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut index = RTreeIndex::new();
        let mut points = Vec::new();

        for _ in 0..300 {
            let p = Point::new(rng.gen_range(0.0..10.0), rng.gen_range(0.0..10.0));
            points.push(p);
            index.add(&[p]).unwrap();
            assert_eq!(index.len(), points.len());

            let query = Point::new(rng.gen_range(0.0..10.0), rng.gen_range(0.0..10.0));
            let (indices, _) = index.knn_search(&query, 3);
            assert_eq!(indices, brute_force(&points, &query, 3));
        }

        index.build().unwrap();
        let query = Point::new(5.0, 5.0);
        assert_eq!(index.knn_search(&query, 4).0, brute_force(&points, &query, 4));
    }

    #[test]
    fn test_ties_follow_insertion_order() {
        let points = vec![
            Point::new(0.0, 1.0),
            Point::new(1.0, 0.0),
            Point::new(-1.0, 0.0),
            Point::new(0.0, -1.0),
        ];
        let index = RTreeIndex::from_points(points).unwrap();
        let (indices, dists) = index.knn_search(&Point::origin(), 3);
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(dists, vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_knn_within_radius() {
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(3.0, 0.0),
        ];
        let index = RTreeIndex::from_points(points).unwrap();
        let near = index.knn_within(&Point::new(0.0, 0.0), 5, 2.0);
        assert_eq!(near.iter().map(|&(i, _)| i).collect::<Vec<_>>(), vec![0, 1]);
        let (nearest, dist) = index.nearest(&Point::new(2.9, 0.0)).unwrap();
        assert_eq!(nearest, 2);
        assert!((dist - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_k_larger_than_size() {
        let index = RTreeIndex::from_points(vec![Point::new(1.0, 1.0)]).unwrap();
        let (indices, _) = index.knn_search(&Point::origin(), 4);
        assert_eq!(indices, vec![0]);
        assert!(RTreeIndex::new().knn_search(&Point::origin(), 4).0.is_empty());
        assert_eq!(*index.point(0), Point::new(1.0, 1.0));
    }

    #[test]
    fn test_non_finite_point_is_rejected() {
        let mut index = RTreeIndex::new();
        let err = index.add(&[Point::new(f64::NAN, 0.0)]).unwrap_err();
        assert!(err.contains("non-finite"));
        assert!(index.is_empty());
    }
}
