//! Geometry primitives used throughout multi_root_planner

use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Absolute tolerance for every comparison that gates a geometric decision
pub const TOLERANCE: f64 = 1e-9;

/// 2D configuration
///
/// Equality is exact; planners compare configurations with
/// [`Point::approx_eq`]. Ordering is lexicographic on `(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn origin() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn set(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn distance_squared(&self, other: &Point) -> f64 {
        (self.x - other.x).powi(2) + (self.y - other.y).powi(2)
    }

    /// Same configuration within [`TOLERANCE`]
    pub fn approx_eq(&self, other: &Point) -> bool {
        (self.x - other.x).abs() <= TOLERANCE && (self.y - other.y).abs() <= TOLERANCE
    }

    /// Point on the segment towards `other` at distance `dist` from `self`.
    ///
    /// Clamped to `other` when `dist` reaches the segment length.
    pub fn get_state_in_distance(&self, other: &Point, dist: f64) -> Point {
        let real_dist = self.distance(other);
        if real_dist <= TOLERANCE || dist >= real_dist {
            return *other;
        }
        let direction = Vector::from_points(self, other);
        *self + direction * (dist / real_dist)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn to_vector(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
}

impl From<(f64, f64)> for Point {
    fn from(tuple: (f64, f64)) -> Self {
        Self { x: tuple.0, y: tuple.1 }
    }
}

impl From<Vector2<f64>> for Point {
    fn from(v: Vector2<f64>) -> Self {
        Self { x: v[0], y: v[1] }
    }
}

impl Add<Vector> for Point {
    type Output = Point;

    fn add(self, v: Vector) -> Point {
        Point::new(self.x + v.x(), self.y + v.y())
    }
}

impl AddAssign<Vector> for Point {
    fn add_assign(&mut self, v: Vector) {
        self.x += v.x();
        self.y += v.y();
    }
}

impl Sub for Point {
    type Output = Vector;

    fn sub(self, other: Point) -> Vector {
        Vector::from_points(&other, &self)
    }
}

/// Displacement between two points
///
/// Stored with a zero z component so that the cross product of two planar
/// vectors is the z-only vector nalgebra gives us.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vector(Vector3<f64>);

impl Vector {
    pub fn new(x: f64, y: f64) -> Self {
        Vector(Vector3::new(x, y, 0.0))
    }

    pub fn zero() -> Self {
        Vector(Vector3::zeros())
    }

    /// Vector pointing from `from` to `to`
    pub fn from_points(from: &Point, to: &Point) -> Self {
        Vector::new(to.x - from.x, to.y - from.y)
    }

    pub fn x(&self) -> f64 {
        self.0[0]
    }

    pub fn y(&self) -> f64 {
        self.0[1]
    }

    pub fn dot(&self, other: &Vector) -> f64 {
        self.0.dot(&other.0)
    }

    /// z component of the cross product
    pub fn cross(&self, other: &Vector) -> f64 {
        self.0.cross(&other.0)[2]
    }

    pub fn norm(&self) -> f64 {
        self.0.norm()
    }

    /// Polar angle in `(-pi, pi]`
    pub fn direction(&self) -> f64 {
        self.y().atan2(self.x())
    }

    /// Scale to unit length. Returns `false` and leaves the vector untouched
    /// when it has no length.
    pub fn normalize(&mut self) -> bool {
        let size = self.norm();
        if size <= TOLERANCE {
            return false;
        }
        self.0 /= size;
        true
    }

    pub fn from_polar(length: f64, angle: f64) -> Self {
        Vector::new(length * angle.cos(), length * angle.sin())
    }
}

impl Add for Vector {
    type Output = Vector;

    fn add(self, other: Vector) -> Vector {
        Vector(self.0 + other.0)
    }
}

impl Sub for Vector {
    type Output = Vector;

    fn sub(self, other: Vector) -> Vector {
        Vector(self.0 - other.0)
    }
}

impl AddAssign for Vector {
    fn add_assign(&mut self, other: Vector) {
        self.0 += other.0;
    }
}

impl SubAssign for Vector {
    fn sub_assign(&mut self, other: Vector) {
        self.0 -= other.0;
    }
}

impl Neg for Vector {
    type Output = Vector;

    fn neg(self) -> Vector {
        Vector(-self.0)
    }
}

impl Mul<f64> for Vector {
    type Output = Vector;

    fn mul(self, scale: f64) -> Vector {
        Vector(self.0 * scale)
    }
}

/// Axis aligned bounds of the configuration space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Range {
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Range { min_x, max_x, min_y, max_y }
    }

    /// Bounding box of `points` grown by `padding` on every side
    pub fn around<'a, I>(points: I, padding: f64) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut range = Range::new(first.x, first.x, first.y, first.y);
        for p in iter {
            range.min_x = range.min_x.min(p.x);
            range.max_x = range.max_x.max(p.x);
            range.min_y = range.min_y.min(p.y);
            range.max_y = range.max_y.max(p.y);
        }
        range.min_x -= padding;
        range.max_x += padding;
        range.min_y -= padding;
        range.max_y += padding;
        Some(range)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Non-empty with finite bounds
    pub fn is_valid(&self) -> bool {
        [self.min_x, self.max_x, self.min_y, self.max_y]
            .iter()
            .all(|v| v.is_finite())
            && self.width() > TOLERANCE
            && self.height() > TOLERANCE
    }

    pub fn contains(&self, p: &Point) -> bool {
        p.x >= self.min_x - TOLERANCE
            && p.x <= self.max_x + TOLERANCE
            && p.y >= self.min_y - TOLERANCE
            && p.y <= self.max_y + TOLERANCE
    }
}

/// Path represented as a sequence of 2D points
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path2D {
    pub points: Vec<Point>,
}

impl Path2D {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    pub fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn x_coords(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.x).collect()
    }

    pub fn y_coords(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.y).collect()
    }

    pub fn total_length(&self) -> f64 {
        if self.points.len() < 2 {
            return 0.0;
        }
        self.points.windows(2)
            .map(|w| w[0].distance(&w[1]))
            .sum()
    }
}
