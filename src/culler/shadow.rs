// src/culler/shadow.rs

use glam::{Vec2, Vec3};

use crate::config::{EPSILON, SMALL_EPSILON};
use crate::geometry::{Box3, Polygon3, Side};

/// Project `polygon` onto the plane of `side` of `occludee` as seen from
/// each corner of `viewer`.
///
/// Each projection is the set of face points whose line of sight to that
/// corner crosses the polygon. For a convex polygon a face point inside all
/// eight projections is hidden from every point of `viewer`. Returns `None`
/// when some projection is empty, in which case the polygon hides nothing on
/// this face.
///
/// Only the part of `polygon` lying more than `SMALL_EPSILON` outside the face
/// plane casts a shadow, so geometry on the face itself (a wall stored in the
/// occludee) never hides the occludee.
pub fn umbra_projections(viewer: &Box3, occludee: &Box3, side: Side, polygon: &Polygon3) -> Option<Vec<Vec<Vec2>>> {
    let (u, v) = side.axis().others();
    let height = |p: Vec3| occludee.outer_distance(side, p);

    let mut projections = Vec::with_capacity(8);
    for corner in viewer.corners() {
        let hc = height(corner);
        if hc <= EPSILON {
            return None;
        }
        // Only the slab between the face plane and the corner can block.
        let clipped = polygon
            .clip_keep(|p| height(p) - SMALL_EPSILON)?
            .clip_keep(|p| hc - EPSILON - height(p))?;
        let projected = clipped
            .vertices
            .iter()
            .map(|&x| {
                let t = hc / (hc - height(x));
                let q = corner + (x - corner) * t;
                Vec2::new(q[u.index()], q[v.index()])
            })
            .collect();
        projections.push(projected);
    }
    Some(projections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::culler::CoverageFace;
    use assert_approx_eq::assert_approx_eq;

    fn wall_x(x: f32, min: Vec2, max: Vec2) -> Polygon3 {
        Polygon3::new(vec![
            Vec3::new(x, min.x, min.y),
            Vec3::new(x, max.x, min.y),
            Vec3::new(x, max.x, max.y),
            Vec3::new(x, min.x, max.y),
        ])
    }

    #[test]
    fn test_projection_from_corner() {
        let viewer = Box3::new(Vec3::ZERO, Vec3::splat(2.0));
        let occludee = Box3::new(Vec3::new(10.0, 0.0, 0.0), Vec3::new(12.0, 2.0, 2.0));
        // Halfway between the corner plane x=2 and the face x=10.
        let wall = wall_x(6.0, Vec2::splat(0.5), Vec2::splat(1.5));
        let projections = umbra_projections(&viewer, &occludee, Side::NegX, &wall).unwrap();
        assert_eq!(projections.len(), 8);
        // Corner 4 = (2, 0, 0): h = 8, wall at h = 4, so t = 2.
        let p = &projections[4];
        assert_approx_eq!(p[0].x, 1.0);
        assert_approx_eq!(p[0].y, 1.0);
        assert_approx_eq!(p[2].x, 3.0);
        assert_approx_eq!(p[2].y, 3.0);
    }

    #[test]
    fn test_wall_behind_face_hides_nothing() {
        let viewer = Box3::new(Vec3::ZERO, Vec3::splat(2.0));
        let occludee = Box3::new(Vec3::new(10.0, 0.0, 0.0), Vec3::new(12.0, 2.0, 2.0));
        let wall = wall_x(11.0, Vec2::splat(-5.0), Vec2::splat(5.0));
        assert!(umbra_projections(&viewer, &occludee, Side::NegX, &wall).is_none());
    }

    #[test]
    fn test_wall_in_face_plane_hides_nothing() {
        let viewer = Box3::new(Vec3::ZERO, Vec3::splat(2.0));
        let occludee = Box3::new(Vec3::new(10.0, 0.0, 0.0), Vec3::new(12.0, 2.0, 2.0));
        let wall = wall_x(10.0, Vec2::splat(-5.0), Vec2::splat(5.0));
        assert!(umbra_projections(&viewer, &occludee, Side::NegX, &wall).is_none());
        // A hair in front of the face still counts as part of it.
        let wall = wall_x(10.0 - SMALL_EPSILON * 0.5, Vec2::splat(-5.0), Vec2::splat(5.0));
        assert!(umbra_projections(&viewer, &occludee, Side::NegX, &wall).is_none());
    }

    #[test]
    fn test_viewer_touching_face_plane() {
        let viewer = Box3::new(Vec3::ZERO, Vec3::new(10.0, 2.0, 2.0));
        let occludee = Box3::new(Vec3::new(10.0, 0.0, 0.0), Vec3::new(12.0, 2.0, 2.0));
        let wall = wall_x(5.0, Vec2::splat(-5.0), Vec2::splat(5.0));
        assert!(umbra_projections(&viewer, &occludee, Side::NegX, &wall).is_none());
    }

    #[test]
    fn test_large_wall_covers_face() {
        let viewer = Box3::new(Vec3::ZERO, Vec3::splat(2.0));
        let occludee = Box3::new(Vec3::new(10.0, 0.0, 0.0), Vec3::new(12.0, 2.0, 2.0));
        let wall = wall_x(9.0, Vec2::splat(-1.0), Vec2::splat(3.0));
        let projections = umbra_projections(&viewer, &occludee, Side::NegX, &wall).unwrap();
        let mut face = CoverageFace::new(&occludee, Side::NegX, 8);
        face.insert_umbra(&projections);
        assert!(face.is_full());
    }

    #[test]
    fn test_small_wall_leaves_gaps() {
        let viewer = Box3::new(Vec3::ZERO, Vec3::splat(2.0));
        let occludee = Box3::new(Vec3::new(10.0, 0.0, 0.0), Vec3::new(12.0, 2.0, 2.0));
        let wall = wall_x(9.0, Vec2::splat(0.5), Vec2::splat(1.5));
        let projections = umbra_projections(&viewer, &occludee, Side::NegX, &wall).unwrap();
        let mut face = CoverageFace::new(&occludee, Side::NegX, 8);
        face.insert_umbra(&projections);
        assert!(!face.is_full());
    }
}
