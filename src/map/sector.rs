// src/map/sector.rs

use std::fmt;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{PvsError, Result};
use crate::geometry::{Box3, Polygon3, Side};
use crate::octree::PolygonStub;

/// Stable index of a polygon in its sector's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PolygonId(pub usize);

impl fmt::Display for PolygonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A static polygon of the sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorPolygon {
    pub polygon: Polygon3,
    /// Portals and other see-through polygons do not block sight.
    pub occluder: bool,
}

/// A rectangular hole in a wall, in the wall's in-plane coordinates
/// (the two axes given by `Axis::others`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Opening {
    pub min: Vec2,
    pub max: Vec2,
}

impl Opening {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Opening { min, max }
    }
}

/// The polygon source an octree is built from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sector {
    pub name: String,
    polygons: Vec<SectorPolygon>,
}

impl Sector {
    pub fn new(name: impl Into<String>) -> Self {
        Sector {
            name: name.into(),
            polygons: Vec::new(),
        }
    }

    fn push(&mut self, polygon: Polygon3, occluder: bool) -> Result<PolygonId> {
        let id = PolygonId(self.polygons.len());
        if polygon.len() < 3 {
            return Err(PvsError::DegeneratePolygon {
                id,
                vertices: polygon.len(),
            });
        }
        self.polygons.push(SectorPolygon { polygon, occluder });
        Ok(id)
    }

    pub fn add_polygon(&mut self, polygon: Polygon3) -> Result<PolygonId> {
        self.push(polygon, true)
    }

    pub fn add_portal(&mut self, polygon: Polygon3) -> Result<PolygonId> {
        self.push(polygon, false)
    }

    /// Add the wall of `room` on `side`, facing into the room, leaving out
    /// `opening` if given. Returns the ids of the (up to four) quads.
    pub fn add_wall(&mut self, room: &Box3, side: Side, opening: Option<Opening>) -> Result<Vec<PolygonId>> {
        let axis = side.axis();
        let (u, v) = axis.others();
        let (u0, u1) = (room.min[u.index()], room.max[u.index()]);
        let (v0, v1) = (room.min[v.index()], room.max[v.index()]);

        let rects = match opening {
            None => vec![(u0, v0, u1, v1)],
            Some(o) => {
                let (ou0, ou1) = (o.min.x.clamp(u0, u1), o.max.x.clamp(u0, u1));
                let (ov0, ov1) = (o.min.y.clamp(v0, v1), o.max.y.clamp(v0, v1));
                vec![
                    (u0, v0, u1, ov0),
                    (u0, ov1, u1, v1),
                    (u0, ov0, ou0, ov1),
                    (ou1, ov0, u1, ov1),
                ]
            }
        };

        let w = room.side_coordinate(side);
        let mut inward = Vec3::ZERO;
        inward[axis.index()] = if side.is_positive() { -1.0 } else { 1.0 };

        let mut ids = Vec::with_capacity(rects.len());
        for (a0, b0, a1, b1) in rects {
            if a1 - a0 <= f32::EPSILON || b1 - b0 <= f32::EPSILON {
                continue;
            }
            let point = |a: f32, b: f32| {
                let mut p = Vec3::ZERO;
                p[axis.index()] = w;
                p[u.index()] = a;
                p[v.index()] = b;
                p
            };
            let mut quad = Polygon3::new(vec![point(a0, b0), point(a1, b0), point(a1, b1), point(a0, b1)]);
            if quad.normal().dot(inward) < 0.0 {
                quad = quad.reversed();
            }
            ids.push(self.add_polygon(quad)?);
        }
        Ok(ids)
    }

    /// Six inward facing walls around `room`, with optional openings.
    pub fn add_room(&mut self, room: &Box3, openings: &[(Side, Opening)]) -> Result<Vec<PolygonId>> {
        let mut ids = Vec::new();
        for side in Side::ALL {
            let opening = openings.iter().find(|(s, _)| *s == side).map(|(_, o)| *o);
            ids.extend(self.add_wall(room, side, opening)?);
        }
        Ok(ids)
    }

    pub fn polygon(&self, id: PolygonId) -> Option<&SectorPolygon> {
        self.polygons.get(id.0)
    }

    pub fn polygons(&self) -> &[SectorPolygon] {
        &self.polygons
    }

    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    pub fn bounding_box(&self) -> Option<Box3> {
        Box3::from_points(self.polygons.iter().flat_map(|p| p.polygon.vertices.iter().copied()))
    }

    /// One stub per polygon, in storage order.
    pub fn stubs(&self) -> Vec<PolygonStub> {
        self.polygons
            .iter()
            .enumerate()
            .map(|(i, p)| PolygonStub::new(PolygonId(i), p.polygon.clone()))
            .collect()
    }
}
