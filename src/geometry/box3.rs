// src/geometry/box3.rs

use glam::Vec3;
use itertools::{iproduct, Itertools};
use serde::{Deserialize, Serialize};

use crate::config::{EPSILON, SMALL_EPSILON};
use crate::geometry::{Axis, Plane3, Side};
use crate::utils::util::approx_eq;

/// Axis-aligned box. Containment tests are closed: points on the faces belong
/// to the box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Box3 {
    pub min: Vec3,
    pub max: Vec3,
}

impl Box3 {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Box3 { min, max }
    }

    /// Smallest box holding all `points`, or `None` for an empty iterator.
    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        Some(iter.fold(Box3::new(first, first), |b, p| {
            Box3::new(b.min.min(p), b.max.max(p))
        }))
    }

    /// True when the box has no volume or is inverted on any axis.
    pub fn is_empty(&self) -> bool {
        !(self.min.is_finite() && self.max.is_finite()) || !self.min.cmplt(self.max).all()
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn union(&self, other: &Box3) -> Box3 {
        Box3::new(self.min.min(other.min), self.max.max(other.max))
    }

    /// Grow (or shrink, for negative `margin`) the box on every side.
    pub fn expanded(&self, margin: f32) -> Box3 {
        Box3::new(self.min - Vec3::splat(margin), self.max + Vec3::splat(margin))
    }

    /// Corner `index`: bit 4 selects max x, bit 2 max y, bit 1 max z.
    pub fn corner(&self, index: usize) -> Vec3 {
        Vec3::new(
            if index & 4 != 0 { self.max.x } else { self.min.x },
            if index & 2 != 0 { self.max.y } else { self.min.y },
            if index & 1 != 0 { self.max.z } else { self.min.z },
        )
    }

    pub fn corners(&self) -> [Vec3; 8] {
        std::array::from_fn(|i| self.corner(i))
    }

    /// The 12 edges as pairs of corner indices.
    pub fn edges() -> impl Iterator<Item = (usize, usize)> {
        iproduct!(0..8usize, [1usize, 2, 4])
            .filter(|&(i, bit)| i & bit == 0)
            .map(|(i, bit)| (i, i | bit))
    }

    /// The child box of octant `index` when split at `center` (same bit layout
    /// as [`Box3::corner`]).
    pub fn octant(&self, center: Vec3, index: usize) -> Box3 {
        let mut min = self.min;
        let mut max = self.max;
        for axis in Axis::ALL {
            let i = axis.index();
            if index & axis.octant_bit() != 0 {
                min[i] = center[i];
            } else {
                max[i] = center[i];
            }
        }
        Box3::new(min, max)
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        self.min.cmple(p).all() && p.cmple(self.max).all()
    }

    pub fn contains_box(&self, other: &Box3) -> bool {
        self.contains_point(other.min) && self.contains_point(other.max)
    }

    pub fn intersects(&self, other: &Box3) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }

    fn adjacent_on(&self, other: &Box3, axis: Axis) -> bool {
        let i = axis.index();
        let touching = approx_eq(other.min[i], self.max[i], SMALL_EPSILON)
            || approx_eq(other.max[i], self.min[i], SMALL_EPSILON);
        if !touching {
            return false;
        }
        let (u, v) = axis.others();
        [u, v].into_iter().all(|a| {
            let j = a.index();
            !(self.max[j] < other.min[j] || self.min[j] > other.max[j])
        })
    }

    /// The side of `self` that `other` touches, if the two boxes share (part
    /// of) a face, an edge or a corner.
    pub fn adjacent(&self, other: &Box3) -> Option<Side> {
        Axis::ALL
            .into_iter()
            .find(|&axis| self.adjacent_on(other, axis))
            .map(|axis| {
                let i = axis.index();
                Side::new(axis, other.max[i] > self.max[i])
            })
    }

    /// Coordinate of the plane holding `side`.
    pub fn side_coordinate(&self, side: Side) -> f32 {
        let i = side.axis().index();
        if side.is_positive() {
            self.max[i]
        } else {
            self.min[i]
        }
    }

    /// Distance of `p` outside the plane of `side`, positive when `p` is on
    /// the outer half-space.
    pub fn outer_distance(&self, side: Side, p: Vec3) -> f32 {
        let i = side.axis().index();
        if side.is_positive() {
            p[i] - self.max[i]
        } else {
            self.min[i] - p[i]
        }
    }

    /// Sides of `self` that some point of `viewer` can look through from the
    /// outside.
    pub fn observer_sides(&self, viewer: &Box3) -> Vec<Side> {
        Side::ALL
            .into_iter()
            .filter(|&side| {
                let farthest = viewer
                    .corners()
                    .into_iter()
                    .map(|c| self.outer_distance(side, c))
                    .fold(f32::MIN, f32::max);
                farthest > EPSILON
            })
            .collect()
    }

    /// Supporting planes of the convex hull of `self` and `other`, normals
    /// pointing away from the hull.
    pub fn outer_planes(&self, other: &Box3) -> Vec<Plane3> {
        let points: Vec<Vec3> = self.corners().into_iter().chain(other.corners()).collect();
        let hull = self.union(other);
        let mut planes: Vec<Plane3> = Side::ALL
            .into_iter()
            .map(|side| {
                let mut normal = Vec3::ZERO;
                normal[side.axis().index()] = if side.is_positive() { 1.0 } else { -1.0 };
                let point = if side.is_positive() { hull.max } else { hull.min };
                Plane3 {
                    normal,
                    d: -normal.dot(point),
                }
            })
            .collect();

        let edges = Box3::edges().collect_vec();
        let edges = &edges;
        let tolerance = EPSILON * (1.0 + hull.size().max_element());
        let candidates = [(self, other), (other, self)]
            .into_iter()
            .flat_map(move |(a, b)| {
                edges
                    .iter()
                    .cartesian_product(b.corners())
                    .map(move |(&(i, j), c)| Plane3::from_points(a.corner(i), a.corner(j), c))
            })
            .flatten();

        for candidate in candidates {
            let oriented = [candidate, candidate.flipped()]
                .into_iter()
                .find(|p| points.iter().all(|&q| p.distance(q) <= tolerance));
            if let Some(plane) = oriented {
                let duplicate = planes.iter().any(|p| {
                    p.normal.abs_diff_eq(plane.normal, EPSILON) && (p.d - plane.d).abs() <= tolerance
                });
                if !duplicate {
                    planes.push(plane);
                }
            }
        }
        planes
    }

    /// True when `self` may hold geometry blocking sight between `box1` and
    /// `box2`: it overlaps the span of the pair on every axis and is not
    /// entirely outside one of their hull `planes`.
    pub fn between(&self, box1: &Box3, box2: &Box3, planes: &[Plane3]) -> bool {
        let spans = Axis::ALL.into_iter().all(|axis| {
            let i = axis.index();
            (self.max[i] >= box1.min[i] && self.min[i] <= box2.max[i])
                || (self.max[i] >= box2.min[i] && self.min[i] <= box1.max[i])
        });
        if !spans {
            return false;
        }
        let corners = self.corners();
        !planes
            .iter()
            .any(|plane| corners.iter().all(|&c| plane.distance(c) > EPSILON))
    }

    /// Slab test against the closed segment `start..end`.
    pub fn intersects_segment(&self, start: Vec3, end: Vec3) -> bool {
        let dir = end - start;
        let mut t0 = 0.0f32;
        let mut t1 = 1.0f32;
        for axis in Axis::ALL {
            let i = axis.index();
            if dir[i].abs() <= f32::EPSILON {
                if start[i] < self.min[i] - EPSILON || start[i] > self.max[i] + EPSILON {
                    return false;
                }
                continue;
            }
            let inv = 1.0 / dir[i];
            let mut near = (self.min[i] - EPSILON - start[i]) * inv;
            let mut far = (self.max[i] + EPSILON - start[i]) * inv;
            if near > far {
                std::mem::swap(&mut near, &mut far);
            }
            t0 = t0.max(near);
            t1 = t1.min(far);
            if t0 > t1 {
                return false;
            }
        }
        true
    }
}
