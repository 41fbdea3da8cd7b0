//! Small geometry helpers.

use serde::{Deserialize, Serialize};

/// A 2D vector in host coordinates (y grows upwards).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Axis-aligned rectangle; `y` is the top edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

pub type Segment = (Vec2, Vec2);

/// Intersection point of two closed segments, if any. Collinear segments do not intersect.
pub fn segment_intersection(a: Segment, b: Segment) -> Option<Vec2> {
    let (p, p2) = a;
    let (q, q2) = b;
    let r = p2 - p;
    let s = q2 - q;
    let denom = r.x * s.y - r.y * s.x;
    if denom.abs() < f64::EPSILON {
        return None;
    }

    let qp = q - p;
    let t = (qp.x * s.y - qp.y * s.x) / denom;
    let u = (qp.x * r.y - qp.y * r.x) / denom;
    if !(0.0..=1.0).contains(&t) || !(0.0..=1.0).contains(&u) {
        return None;
    }
    Some(Vec2::new(p.x + t * r.x, p.y + t * r.y))
}

pub fn fmean(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut n = 0usize;
    for v in values {
        sum += v;
        n += 1;
    }
    if n == 0 { 0.0 } else { sum / n as f64 }
}

/// `|a - b| <= tol`.
pub fn is_close(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}
