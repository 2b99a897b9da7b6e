// src/culler/coverage_cube.rs

use bitvec::prelude::*;
use enum_map::EnumMap;
use glam::Vec2;

use crate::config::EPSILON;
use crate::geometry::{Box3, Side};

/// A `resolution x resolution` coverage mask over one face of a box, in the
/// face's in-plane coordinates (the two axes given by `Axis::others`).
#[derive(Debug, Clone)]
pub struct CoverageFace {
    side: Side,
    resolution: usize,
    origin: Vec2,
    size: Vec2,
    mask: BitVec,
}

impl CoverageFace {
    pub fn new(bbox: &Box3, side: Side, resolution: usize) -> Self {
        let resolution = resolution.max(1);
        let (u, v) = side.axis().others();
        let origin = Vec2::new(bbox.min[u.index()], bbox.min[v.index()]);
        let size = Vec2::new(bbox.max[u.index()], bbox.max[v.index()]) - origin;
        CoverageFace {
            side,
            resolution,
            origin,
            size,
            mask: bitvec![0; resolution * resolution],
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn make_empty(&mut self) {
        self.mask.fill(false);
    }

    pub fn is_full(&self) -> bool {
        self.mask.all()
    }

    pub fn covered_cells(&self) -> usize {
        self.mask.count_ones()
    }

    pub fn cell_count(&self) -> usize {
        self.mask.len()
    }

    pub fn is_covered(&self, i: usize, j: usize) -> bool {
        self.mask[j * self.resolution + i]
    }

    fn grid_point(&self, i: usize, j: usize) -> Vec2 {
        self.origin + self.size * Vec2::new(i as f32, j as f32) / self.resolution as f32
    }

    /// Grid lines `lo..=hi` lying inside `min..=max` (give or take `EPSILON`)
    /// along one in-plane axis.
    fn grid_range(&self, min: f32, max: f32, axis: usize) -> Option<(usize, usize)> {
        let n = self.resolution as f32;
        let lo = ((min - EPSILON - self.origin[axis]) / self.size[axis] * n).ceil().max(0.0);
        let hi = ((max + EPSILON - self.origin[axis]) / self.size[axis] * n).floor().min(n);
        (lo <= hi).then(|| (lo as usize, hi as usize))
    }

    /// Mark every cell lying entirely inside the intersection of the convex
    /// `polygons`. Returns the number of newly covered cells.
    pub fn insert_umbra(&mut self, polygons: &[Vec<Vec2>]) -> usize {
        if polygons.is_empty() {
            return 0;
        }
        let mut lo = Vec2::splat(f32::MIN);
        let mut hi = Vec2::splat(f32::MAX);
        for poly in polygons {
            let (pmin, pmax) = poly.iter().fold(
                (Vec2::splat(f32::MAX), Vec2::splat(f32::MIN)),
                |(a, b), &p| (a.min(p), b.max(p)),
            );
            lo = lo.max(pmin);
            hi = hi.min(pmax);
        }
        let (Some((i0, i1)), Some((j0, j1))) = (self.grid_range(lo.x, hi.x, 0), self.grid_range(lo.y, hi.y, 1)) else {
            return 0;
        };

        let width = i1 - i0 + 1;
        let inside: Vec<bool> = (j0..=j1)
            .flat_map(|j| (i0..=i1).map(move |i| (i, j)))
            .map(|(i, j)| {
                let p = self.grid_point(i, j);
                polygons.iter().all(|poly| convex_contains(poly, p))
            })
            .collect();
        let corner = |i: usize, j: usize| inside[(j - j0) * width + (i - i0)];

        let mut added = 0;
        for j in j0..j1 {
            for i in i0..i1 {
                if corner(i, j) && corner(i + 1, j) && corner(i, j + 1) && corner(i + 1, j + 1) {
                    let index = j * self.resolution + i;
                    if !self.mask[index] {
                        self.mask.set(index, true);
                        added += 1;
                    }
                }
            }
        }
        added
    }
}

/// Containment in a convex polygon of either winding. Points up to `EPSILON`
/// outside an edge count as inside; degenerate polygons contain nothing.
fn convex_contains(poly: &[Vec2], p: Vec2) -> bool {
    if poly.len() < 3 {
        return false;
    }
    let n = poly.len();
    let winding: f32 = (0..n).map(|i| poly[i].perp_dot(poly[(i + 1) % n])).sum();
    if winding == 0.0 {
        return false;
    }
    let sign = winding.signum();
    (0..n).all(|i| {
        let a = poly[i];
        let b = poly[(i + 1) % n];
        let edge = b - a;
        edge.perp_dot(p - a) * sign >= -EPSILON * edge.length()
    })
}

/// Coverage masks for the six faces of one occludee box.
#[derive(Debug, Clone)]
pub struct CoverageCube {
    faces: EnumMap<Side, CoverageFace>,
}

impl CoverageCube {
    pub fn new(occludee: &Box3, resolution: usize) -> Self {
        CoverageCube {
            faces: EnumMap::from_fn(|side| CoverageFace::new(occludee, side, resolution)),
        }
    }

    pub fn face(&self, side: Side) -> &CoverageFace {
        &self.faces[side]
    }

    pub fn face_mut(&mut self, side: Side) -> &mut CoverageFace {
        &mut self.faces[side]
    }

    pub fn make_empty(&mut self, sides: &[Side]) {
        for &side in sides {
            self.faces[side].make_empty();
        }
    }

    pub fn all_full(&self, sides: &[Side]) -> bool {
        sides.iter().all(|&side| self.faces[side].is_full())
    }
}
