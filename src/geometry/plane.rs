// src/geometry/plane.rs

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::geometry::Axis;

/// A plane `normal . p + d = 0`. The normal is kept unit length so that
/// `distance` is a true euclidean distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane3 {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane3 {
    /// Returns `None` when `normal` has no usable length.
    pub fn new(normal: Vec3, d: f32) -> Option<Self> {
        let len = normal.length();
        if len <= f32::EPSILON || !len.is_finite() {
            return None;
        }
        Some(Plane3 {
            normal: normal / len,
            d: d / len,
        })
    }

    pub fn from_normal_and_point(normal: Vec3, point: Vec3) -> Option<Self> {
        let n = normal.normalize_or_zero();
        if n == Vec3::ZERO {
            return None;
        }
        Some(Plane3 {
            normal: n,
            d: -n.dot(point),
        })
    }

    /// Plane through three points, oriented by the right-hand rule.
    pub fn from_points(a: Vec3, b: Vec3, c: Vec3) -> Option<Self> {
        Self::from_normal_and_point((b - a).cross(c - a), a)
    }

    /// The plane `axis = value`, front side towards increasing coordinates.
    pub fn axis(axis: Axis, value: f32) -> Self {
        let mut normal = Vec3::ZERO;
        normal[axis.index()] = 1.0;
        Plane3 { normal, d: -value }
    }

    /// Signed distance; positive in front.
    pub fn distance(&self, p: Vec3) -> f32 {
        self.normal.dot(p) + self.d
    }

    pub fn flipped(&self) -> Self {
        Plane3 {
            normal: -self.normal,
            d: -self.d,
        }
    }

    /// Intersection parameter of segment `start..end` with the plane, if it crosses.
    pub fn intersect_segment(&self, start: Vec3, end: Vec3) -> Option<f32> {
        let ds = self.distance(start);
        let de = self.distance(end);
        let denom = ds - de;
        if denom.abs() <= f32::EPSILON {
            return None;
        }
        let t = ds / denom;
        (0.0..=1.0).contains(&t).then_some(t)
    }
}
