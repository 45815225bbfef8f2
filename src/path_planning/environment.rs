//! Planar environments for the multi-root planner
//!
//! Obstacles are inflated by the collision distance, so a configuration is
//! valid when it keeps at least that clearance from every obstacle.

use crate::common::{Environment, Point, Range, Vector, TOLERANCE};

/// Circular obstacle (x, y, radius)
#[derive(Debug, Clone)]
pub struct CircleObstacle {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

impl CircleObstacle {
    pub fn new(x: f64, y: f64, radius: f64) -> Self {
        Self { x, y, radius }
    }

    fn center(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Thin wall between two points
#[derive(Debug, Clone)]
pub struct SegmentObstacle {
    pub start: Point,
    pub end: Point,
}

impl SegmentObstacle {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }
}

/// Squared distance from `p` to the segment `v`-`w`
pub fn distance_squared_point_to_segment(v: &Point, w: &Point, p: &Point) -> f64 {
    let l2 = v.distance_squared(w);
    if l2 <= TOLERANCE * TOLERANCE {
        return p.distance_squared(v);
    }

    let t = (Vector::from_points(v, p).dot(&Vector::from_points(v, w)) / l2).clamp(0.0, 1.0);
    let projection = *v + Vector::from_points(v, w) * t;
    p.distance_squared(&projection)
}

fn orientation(a: &Point, b: &Point, c: &Point) -> f64 {
    Vector::from_points(a, b).cross(&Vector::from_points(a, c))
}

/// Proper or touching intersection of segments `a1`-`a2` and `b1`-`b2`
pub fn segments_intersect(a1: &Point, a2: &Point, b1: &Point, b2: &Point) -> bool {
    let d1 = orientation(b1, b2, a1);
    let d2 = orientation(b1, b2, a2);
    let d3 = orientation(a1, a2, b1);
    let d4 = orientation(a1, a2, b2);

    if ((d1 > TOLERANCE && d2 < -TOLERANCE) || (d1 < -TOLERANCE && d2 > TOLERANCE))
        && ((d3 > TOLERANCE && d4 < -TOLERANCE) || (d3 < -TOLERANCE && d4 > TOLERANCE))
    {
        return true;
    }

    // collinear or touching cases
    let eps2 = TOLERANCE * TOLERANCE;
    distance_squared_point_to_segment(b1, b2, a1) <= eps2
        || distance_squared_point_to_segment(b1, b2, a2) <= eps2
        || distance_squared_point_to_segment(a1, a2, b1) <= eps2
        || distance_squared_point_to_segment(a1, a2, b2) <= eps2
}

/// Squared distance between two segments
pub fn distance_squared_segment_to_segment(a1: &Point, a2: &Point, b1: &Point, b2: &Point) -> f64 {
    if segments_intersect(a1, a2, b1, b2) {
        return 0.0;
    }
    distance_squared_point_to_segment(b1, b2, a1)
        .min(distance_squared_point_to_segment(b1, b2, a2))
        .min(distance_squared_point_to_segment(a1, a2, b1))
        .min(distance_squared_point_to_segment(a1, a2, b2))
}

/// Obstacle-free space bounded by a range
#[derive(Debug, Clone)]
pub struct EmptyEnvironment {
    range: Range,
}

impl EmptyEnvironment {
    pub fn new(range: Range) -> Self {
        Self { range }
    }
}

impl Environment for EmptyEnvironment {
    fn is_valid(&self, p: &Point) -> bool {
        self.range.contains(p)
    }

    fn is_valid_edge(&self, a: &Point, b: &Point) -> bool {
        // the range is convex
        self.is_valid(a) && self.is_valid(b)
    }

    fn range(&self) -> Range {
        self.range
    }

    fn set_range(&mut self, range: Range) {
        self.range = range;
    }
}

/// Range with circular and wall obstacles
#[derive(Debug, Clone)]
pub struct ObstacleEnvironment {
    range: Range,
    circles: Vec<CircleObstacle>,
    walls: Vec<SegmentObstacle>,
    collision_dist: f64,
}

impl ObstacleEnvironment {
    pub fn new(range: Range, collision_dist: f64) -> Self {
        Self {
            range,
            circles: Vec::new(),
            walls: Vec::new(),
            collision_dist,
        }
    }

    pub fn with_circle(mut self, circle: CircleObstacle) -> Self {
        self.circles.push(circle);
        self
    }

    pub fn with_wall(mut self, start: Point, end: Point) -> Self {
        self.walls.push(SegmentObstacle::new(start, end));
        self
    }

    /// Create from `(x, y, radius)` tuples
    pub fn from_circles(range: Range, obstacle_list: &[(f64, f64, f64)], collision_dist: f64) -> Self {
        let mut env = Self::new(range, collision_dist);
        env.circles = obstacle_list
            .iter()
            .map(|&(x, y, r)| CircleObstacle::new(x, y, r))
            .collect();
        env
    }

    pub fn circles(&self) -> &[CircleObstacle] {
        &self.circles
    }

    pub fn walls(&self) -> &[SegmentObstacle] {
        &self.walls
    }

    pub fn collision_dist(&self) -> f64 {
        self.collision_dist
    }
}

impl Environment for ObstacleEnvironment {
    fn is_valid(&self, p: &Point) -> bool {
        if !self.range.contains(p) {
            return false;
        }
        let clear_of_circles = self.circles.iter().all(|c| {
            c.center().distance(p) > c.radius + self.collision_dist
        });
        clear_of_circles
            && self.walls.iter().all(|w| {
                distance_squared_point_to_segment(&w.start, &w.end, p) > self.collision_dist.powi(2)
            })
    }

    fn is_valid_edge(&self, a: &Point, b: &Point) -> bool {
        if !self.is_valid(a) || !self.is_valid(b) {
            return false;
        }
        let clear_of_circles = self.circles.iter().all(|c| {
            let r = c.radius + self.collision_dist;
            distance_squared_point_to_segment(a, b, &c.center()) > r * r
        });
        clear_of_circles
            && self.walls.iter().all(|w| {
                distance_squared_segment_to_segment(a, b, &w.start, &w.end) > self.collision_dist.powi(2)
            })
    }

    fn range(&self) -> Range {
        self.range
    }

    fn set_range(&mut self, range: Range) {
        self.range = range;
    }
}
