// src/geometry/mod.rs
//! Axis-aligned boxes, planes and convex polygons in world space.

pub mod box3;
pub mod plane;
pub mod polygon;

pub use box3::Box3;
pub use plane::Plane3;
pub use polygon::Polygon3;

use enum_map::Enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// The two axes spanning a plane perpendicular to `self`, in ascending order.
    pub fn others(self) -> (Axis, Axis) {
        match self {
            Axis::X => (Axis::Y, Axis::Z),
            Axis::Y => (Axis::X, Axis::Z),
            Axis::Z => (Axis::X, Axis::Y),
        }
    }

    /// Bit of this axis in an octant index.
    pub fn octant_bit(self) -> usize {
        match self {
            Axis::X => 4,
            Axis::Y => 2,
            Axis::Z => 1,
        }
    }
}

/// One of the six faces of an axis-aligned box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum)]
pub enum Side {
    NegX,
    PosX,
    NegY,
    PosY,
    NegZ,
    PosZ,
}

impl Side {
    pub const ALL: [Side; 6] = [
        Side::NegX,
        Side::PosX,
        Side::NegY,
        Side::PosY,
        Side::NegZ,
        Side::PosZ,
    ];

    pub fn new(axis: Axis, positive: bool) -> Self {
        match (axis, positive) {
            (Axis::X, false) => Side::NegX,
            (Axis::X, true) => Side::PosX,
            (Axis::Y, false) => Side::NegY,
            (Axis::Y, true) => Side::PosY,
            (Axis::Z, false) => Side::NegZ,
            (Axis::Z, true) => Side::PosZ,
        }
    }

    pub fn axis(self) -> Axis {
        match self {
            Side::NegX | Side::PosX => Axis::X,
            Side::NegY | Side::PosY => Axis::Y,
            Side::NegZ | Side::PosZ => Axis::Z,
        }
    }

    pub fn is_positive(self) -> bool {
        matches!(self, Side::PosX | Side::PosY | Side::PosZ)
    }

    pub fn opposite(self) -> Self {
        Side::new(self.axis(), !self.is_positive())
    }
}

/// Position of a polygon relative to a splitting plane. `Front` is the
/// greater-coordinate side of an axis plane, or the side a general plane's
/// normal points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolygonPosition {
    Front,
    Back,
    Spanning,
    Coincident,
}

impl PolygonPosition {
    /// Fold the signed distances of a polygon's vertices into a position.
    pub fn from_distances<I: IntoIterator<Item = f32>>(distances: I, epsilon: f32) -> Self {
        let mut front = false;
        let mut back = false;
        for d in distances {
            if d > epsilon {
                front = true;
            } else if d < -epsilon {
                back = true;
            }
        }
        match (front, back) {
            (true, true) => PolygonPosition::Spanning,
            (true, false) => PolygonPosition::Front,
            (false, true) => PolygonPosition::Back,
            (false, false) => PolygonPosition::Coincident,
        }
    }
}
