// src/geometry/polygon.rs

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::{EPSILON, SMALL_EPSILON};
use crate::geometry::{Axis, Box3, Plane3, PolygonPosition};

/// A convex planar polygon in world space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon3 {
    pub vertices: Vec<Vec3>,
}

impl Polygon3 {
    pub fn new(vertices: Vec<Vec3>) -> Self {
        Polygon3 { vertices }
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    fn edges(&self) -> impl Iterator<Item = (Vec3, Vec3)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    /// Newell normal, its length is twice the polygon area.
    fn newell(&self) -> Vec3 {
        self.edges().fold(Vec3::ZERO, |acc, (a, b)| {
            acc + Vec3::new(
                (a.y - b.y) * (a.z + b.z),
                (a.z - b.z) * (a.x + b.x),
                (a.x - b.x) * (a.y + b.y),
            )
        })
    }

    pub fn normal(&self) -> Vec3 {
        self.newell().normalize_or_zero()
    }

    pub fn area(&self) -> f32 {
        self.newell().length() * 0.5
    }

    pub fn centroid(&self) -> Vec3 {
        if self.vertices.is_empty() {
            return Vec3::ZERO;
        }
        self.vertices.iter().copied().sum::<Vec3>() / self.vertices.len() as f32
    }

    pub fn plane(&self) -> Option<Plane3> {
        if self.vertices.len() < 3 {
            return None;
        }
        Plane3::from_normal_and_point(self.newell(), self.centroid())
    }

    pub fn bounding_box(&self) -> Option<Box3> {
        Box3::from_points(self.vertices.iter().copied())
    }

    /// Too small to matter: fewer than three vertices or (nearly) no area.
    pub fn is_degenerate(&self) -> bool {
        self.vertices.len() < 3 || self.area() < SMALL_EPSILON
    }

    pub fn classify_plane(&self, plane: &Plane3) -> PolygonPosition {
        PolygonPosition::from_distances(self.vertices.iter().map(|&v| plane.distance(v)), EPSILON)
    }

    pub fn classify_axis(&self, axis: Axis, value: f32) -> PolygonPosition {
        let i = axis.index();
        PolygonPosition::from_distances(self.vertices.iter().map(|v| v[i] - value), EPSILON)
    }

    /// Sutherland-Hodgman clip keeping the part where `f >= 0`.
    pub fn clip_keep<F: Fn(Vec3) -> f32>(&self, f: F) -> Option<Polygon3> {
        let mut out = Vec::with_capacity(self.vertices.len() + 2);
        for (a, b) in self.edges() {
            let fa = f(a);
            let fb = f(b);
            if fa >= 0.0 {
                out.push(a);
            }
            if (fa >= 0.0) != (fb >= 0.0) {
                let t = fa / (fa - fb);
                out.push(a + (b - a) * t);
            }
        }
        out.dedup_by(|a, b| a.abs_diff_eq(*b, EPSILON));
        while out.len() > 1 && out[0].abs_diff_eq(out[out.len() - 1], EPSILON) {
            out.pop();
        }
        (out.len() >= 3).then(|| Polygon3::new(out))
    }

    /// Split by `plane` into (front, back). Coincident polygons go to the
    /// front. A fragment too small to matter is dropped and the whole polygon
    /// is kept on the other side; if both fragments are degenerate the
    /// polygon follows its centroid.
    pub fn split_with_plane(&self, plane: &Plane3) -> (Option<Polygon3>, Option<Polygon3>) {
        match self.classify_plane(plane) {
            PolygonPosition::Front | PolygonPosition::Coincident => (Some(self.clone()), None),
            PolygonPosition::Back => (None, Some(self.clone())),
            PolygonPosition::Spanning => {
                let front = self
                    .clip_keep(|p| plane.distance(p))
                    .filter(|p| !p.is_degenerate());
                let back = self
                    .clip_keep(|p| -plane.distance(p))
                    .filter(|p| !p.is_degenerate());
                match (front, back) {
                    (Some(f), Some(b)) => (Some(f), Some(b)),
                    (Some(_), None) => (Some(self.clone()), None),
                    (None, Some(_)) => (None, Some(self.clone())),
                    (None, None) => {
                        if plane.distance(self.centroid()) >= 0.0 {
                            (Some(self.clone()), None)
                        } else {
                            (None, Some(self.clone()))
                        }
                    }
                }
            }
        }
    }

    pub fn split_with_plane_axis(&self, axis: Axis, value: f32) -> (Option<Polygon3>, Option<Polygon3>) {
        self.split_with_plane(&Plane3::axis(axis, value))
    }

    /// Intersection of the segment `start..end` with the polygon, as the
    /// segment parameter and the hit point.
    pub fn intersect_segment(&self, start: Vec3, end: Vec3) -> Option<(f32, Vec3)> {
        let plane = self.plane()?;
        let t = plane.intersect_segment(start, end)?;
        let point = start + (end - start) * t;
        self.contains_coplanar_point(plane.normal, point).then_some((t, point))
    }

    fn contains_coplanar_point(&self, normal: Vec3, p: Vec3) -> bool {
        self.edges().all(|(a, b)| {
            let edge = b - a;
            edge.cross(p - a).dot(normal) >= -EPSILON * edge.length()
        })
    }

    pub fn reversed(&self) -> Polygon3 {
        let mut vertices = self.vertices.clone();
        vertices.reverse();
        Polygon3::new(vertices)
    }
}
