// src/octree/pvs.rs

use std::collections::HashSet;

use glam::Vec3;
use log::{debug, info, trace};

use crate::config::EPSILON;
use crate::culler::{umbra_projections, CoverageCube};
use crate::error::{PvsError, Result};
use crate::geometry::{Box3, Plane3, Polygon3};
use crate::map::{PolygonId, Sector};
use crate::octree::{NodeId, Octree, Pvs};

/// An occluding polygon of the sector with its bounds.
struct Occluder<'a> {
    bbox: Box3,
    polygon: &'a Polygon3,
}

/// The polygons among `ids` that block sight, in id order.
fn occluders_of(sector: &Sector, ids: impl IntoIterator<Item = PolygonId>) -> Vec<Occluder<'_>> {
    ids.into_iter()
        .filter_map(|id| sector.polygon(id))
        .filter(|p| p.occluder)
        .filter_map(|p| {
            Some(Occluder {
                bbox: p.polygon.bounding_box()?,
                polygon: &p.polygon,
            })
        })
        .collect()
}

impl Octree {
    /// Compute the potentially visible set of every leaf.
    pub fn build_pvs(&mut self, sector: &Sector) -> Result<()> {
        if !self.is_built() {
            return Err(PvsError::NotBuilt);
        }
        if sector.polygon_count() != self.polygon_count {
            return Err(PvsError::SectorMismatch {
                expected: self.polygon_count,
                actual: sector.polygon_count(),
            });
        }

        let leaves: Vec<NodeId> = self.leaves().collect();
        let mut stored: Vec<PolygonId> = leaves
            .iter()
            .flat_map(|&leaf| self.nodes[leaf.0].unsplit_polygons.iter().copied())
            .collect();
        stored.sort_unstable();
        stored.dedup();
        let occluders = occluders_of(sector, stored);
        let candidates: Vec<&Occluder> = occluders.iter().collect();
        debug!("{} occluders for {} leaves", candidates.len(), leaves.len());

        let mut total = 0;
        for &leaf in &leaves {
            let mut pvs = Pvs::default();
            let viewer = self.nodes[leaf.0].bbox;
            self.collect_visible(sector, &viewer, NodeId(0), &candidates, &mut pvs);
            debug!("leaf {:?}: {} PVS entries", leaf, pvs.len());
            total += pvs.len();
            self.nodes[leaf.0].pvs = pvs;
        }
        self.pvs_built = true;
        info!(
            "built PVS for {} leaves, {} entries ({:.1} per leaf)",
            leaves.len(),
            total,
            total as f32 / leaves.len().max(1) as f32
        );
        Ok(())
    }

    /// Add `id` to `pvs` if `viewer` may see it, then try its children.
    ///
    /// `occluders` holds every occluder that may lie between `viewer` and the
    /// parent of `id`. A child's hull with the viewer lies inside its
    /// parent's, so each level only filters the list it was handed.
    fn collect_visible(&self, sector: &Sector, viewer: &Box3, id: NodeId, occluders: &[&Occluder], pvs: &mut Pvs) {
        let node = &self.nodes[id.0];
        let touching = node.bbox.contains_point(viewer.center())
            || viewer.contains_point(node.bbox.center())
            || viewer.adjacent(&node.bbox).is_some();

        let relevant: Vec<&Occluder>;
        let occluders = if touching {
            occluders
        } else {
            let planes = viewer.outer_planes(&node.bbox);
            relevant = occluders
                .iter()
                .copied()
                .filter(|o| o.bbox.between(viewer, &node.bbox, &planes))
                .collect();
            if !self.can_see(viewer, &node.bbox, &relevant) {
                return;
            }
            relevant.as_slice()
        };

        let polygons = match &node.mini_bsp {
            Some(bsp) if node.is_leaf() => bsp
                .polygon_ids()
                .into_iter()
                .filter(|&p| !faces_away(sector, p, viewer))
                .collect(),
            _ => Vec::new(),
        };
        pvs.add(id, polygons);

        if let Some(children) = node.children {
            for child in children {
                self.collect_visible(sector, viewer, child, occluders, pvs);
            }
        }
    }

    /// Whether any point of `viewer` may see any point of `occludee`, given
    /// the occluding polygons of `sector` stored in the tree.
    pub fn box_can_see_occludee(&self, sector: &Sector, viewer: &Box3, occludee: &Box3) -> Result<bool> {
        if !self.is_built() {
            return Err(PvsError::NotBuilt);
        }
        let planes = viewer.outer_planes(occludee);
        let occluders = occluders_of(sector, self.collect_occluders(viewer, occludee, &planes));
        let candidates: Vec<&Occluder> = occluders.iter().collect();
        Ok(self.can_see(viewer, occludee, &candidates))
    }

    fn can_see(&self, viewer: &Box3, occludee: &Box3, occluders: &[&Occluder]) -> bool {
        let sides = occludee.observer_sides(viewer);
        if sides.is_empty() || occluders.is_empty() {
            return true;
        }

        let mut cube = CoverageCube::new(occludee, self.config.coverage_resolution);
        cube.make_empty(&sides);

        for occluder in occluders {
            for &side in &sides {
                if cube.face(side).is_full() {
                    continue;
                }
                if let Some(umbra) = umbra_projections(viewer, occludee, side, occluder.polygon) {
                    cube.face_mut(side).insert_umbra(&umbra);
                }
            }
            if cube.all_full(&sides) {
                trace!("{:?} hidden from {:?}", occludee, viewer);
                return false;
            }
        }
        true
    }

    /// Distinct polygons stored in leaves that may lie between the two boxes.
    fn collect_occluders(&self, viewer: &Box3, occludee: &Box3, planes: &[Plane3]) -> Vec<PolygonId> {
        let mut seen = HashSet::new();
        let mut occluders = Vec::new();
        let mut stack = vec![NodeId(0)];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            let relevant = node.bbox.contains_point(viewer.center())
                || node.bbox.contains_point(occludee.center())
                || node.bbox.between(viewer, occludee, planes);
            if !relevant {
                continue;
            }
            match node.children {
                Some(children) => stack.extend(children.iter().rev()),
                None => occluders.extend(node.unsplit_polygons.iter().copied().filter(|&p| seen.insert(p))),
            }
        }
        occluders
    }

    /// Stamp every node and polygon in the PVS of the leaf holding `pos`
    /// with a fresh version. Returns that version.
    pub fn mark_visible_from_pvs(&mut self, pos: Vec3) -> Result<u64> {
        if !self.pvs_built {
            return Err(PvsError::PvsNotBuilt);
        }
        let leaf = self.locate_leaf(pos).ok_or(PvsError::NotBuilt)?;
        self.vis_counter += 1;
        let version = self.vis_counter;

        let pvs = std::mem::take(&mut self.nodes[leaf.0].pvs);
        for entry in pvs.entries() {
            self.nodes[entry.node.0].visibility_stamp = version;
            for polygon in &entry.polygons {
                if let Some(stamp) = self.polygon_stamps.get_mut(polygon.0) {
                    *stamp = version;
                }
            }
        }
        trace!("marked {} nodes visible from {:?} (version {})", pvs.len(), leaf, version);
        self.nodes[leaf.0].pvs = pvs;
        Ok(version)
    }

    /// Version written by the last `mark_visible_from_pvs`, 0 before any.
    pub fn visibility_version(&self) -> u64 {
        self.vis_counter
    }

    fn is_current(&self, stamp: u64) -> bool {
        self.vis_counter != 0 && stamp == self.vis_counter
    }

    pub fn is_node_visible(&self, id: NodeId) -> bool {
        self.nodes.get(id.0).is_some_and(|n| self.is_current(n.visibility_stamp))
    }

    pub fn is_polygon_visible(&self, id: PolygonId) -> bool {
        self.polygon_stamps.get(id.0).is_some_and(|&s| self.is_current(s))
    }

    pub fn visible_polygons(&self) -> Vec<PolygonId> {
        self.polygon_stamps
            .iter()
            .enumerate()
            .filter(|&(_, &s)| self.is_current(s))
            .map(|(i, _)| PolygonId(i))
            .collect()
    }

    pub fn visible_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| self.is_current(n.visibility_stamp))
            .map(|n| n.id)
            .collect()
    }
}

/// True when every corner of `viewer` lies behind the plane of polygon `id`.
fn faces_away(sector: &Sector, id: PolygonId, viewer: &Box3) -> bool {
    let Some(plane) = sector.polygon(id).and_then(|p| p.polygon.plane()) else {
        return false;
    };
    viewer.corners().iter().all(|&c| plane.distance(c) < -EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OctreeConfig;
    use crate::geometry::Side;
    use crate::map::sector::scenes;
    use crate::map::{GeneratorConfig, ProceduralGenerator};
    use crate::octree::{NoCull, OctreeNode, PolygonStub};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn tree_for(sector: &Sector, threshold: usize) -> Octree {
        let bbox = sector.bounding_box().unwrap().expanded(1.0);
        let mut tree = Octree::new(bbox, OctreeConfig::default().with_bsp_threshold(threshold)).unwrap();
        tree.build(sector).unwrap();
        tree
    }

    #[test]
    fn test_doorway_visibility() {
        let (sector, [a, b, c]) = scenes::doorway_rooms();
        let (a, b, c) = (a.expanded(-0.5), b.expanded(-0.5), c.expanded(-0.5));
        for threshold in [30, 4] {
            let tree = tree_for(&sector, threshold);
            assert!(tree.box_can_see_occludee(&sector, &a, &b).unwrap());
            assert!(tree.box_can_see_occludee(&sector, &b, &a).unwrap());
            assert!(!tree.box_can_see_occludee(&sector, &a, &c).unwrap());
            assert!(!tree.box_can_see_occludee(&sector, &b, &c).unwrap());
            assert!(!tree.box_can_see_occludee(&sector, &c, &a).unwrap());
        }
    }

    #[test]
    fn test_portal_does_not_occlude() {
        let (sector, [a, _, c]) = scenes::doorway_rooms();
        let mut open = Sector::new("open");
        for p in sector.polygons() {
            open.add_portal(p.polygon.clone()).unwrap();
        }
        let tree = tree_for(&open, 30);
        assert!(tree
            .box_can_see_occludee(&open, &a.expanded(-0.5), &c.expanded(-0.5))
            .unwrap());
    }

    #[test]
    fn test_viewer_overlapping_occludee_sees_it() {
        let (sector, [a, ..]) = scenes::doorway_rooms();
        let tree = tree_for(&sector, 30);
        let inner = a.expanded(-2.0);
        assert!(tree.box_can_see_occludee(&sector, &inner, &a).unwrap());
        assert!(tree.box_can_see_occludee(&sector, &a, &inner).unwrap());
    }

    #[test]
    fn test_cube_room_marks_all_polygons() {
        let (sector, room) = scenes::cube_room(10.0);
        for threshold in [30, 4] {
            let mut tree = tree_for(&sector, threshold);
            tree.build_pvs(&sector).unwrap();
            let version = tree.mark_visible_from_pvs(Vec3::new(1.0, 2.0, 3.0)).unwrap();
            assert_eq!(version, 1);
            assert_eq!(tree.visible_polygons(), (0..6).map(PolygonId).collect::<Vec<_>>());
            assert!(tree.is_node_visible(tree.locate_leaf(room.center()).unwrap()));
        }
    }

    #[test]
    fn test_pvs_structure() {
        let (sector, _) = scenes::doorway_rooms();
        let mut tree = tree_for(&sector, 4);
        tree.build_pvs(&sector).unwrap();
        for leaf in tree.leaves() {
            let pvs = tree.node(leaf).pvs();
            assert!(pvs.contains(NodeId(0)));
            assert!(pvs.contains(leaf));
            for entry in pvs.entries() {
                let node = tree.node(entry.node);
                if !node.is_leaf() {
                    assert!(entry.polygons.is_empty());
                }
            }
            for node in tree.nodes() {
                if let Some(children) = node.children() {
                    if children.iter().any(|&c| pvs.contains(c)) {
                        assert!(pvs.contains(node.id()));
                    }
                }
            }
        }
    }

    #[test]
    fn test_back_facing_polygons_filtered() {
        // Two walls at x = 2 and x = 8, both facing -x.
        let mut sector = Sector::new("backs");
        for x in [2.0, 8.0] {
            let room = Box3::new(Vec3::new(-4.0, 0.0, 0.0), Vec3::new(x, 10.0, 10.0));
            sector.add_wall(&room, Side::PosX, None).unwrap();
        }
        assert!(sector.polygons().iter().all(|p| p.polygon.normal().x < 0.0));

        let bbox = Box3::new(Vec3::ZERO, Vec3::splat(10.0));
        let mut tree = Octree::new(bbox, OctreeConfig::default().with_bsp_threshold(1)).unwrap();
        tree.build(&sector).unwrap();
        tree.build_pvs(&sector).unwrap();

        let near = tree.locate_leaf(Vec3::splat(2.5)).unwrap();
        let far = tree.locate_leaf(Vec3::splat(7.5)).unwrap();
        let entry = |from: NodeId, to: NodeId| {
            tree.node(from)
                .pvs()
                .entries()
                .iter()
                .find(|e| e.node == to)
                .map(|e| e.polygons.clone())
        };
        assert_eq!(entry(far, near), Some(vec![]));
        assert_eq!(entry(far, far), Some(vec![PolygonId(1)]));
        assert_eq!(entry(near, near), Some(vec![PolygonId(0)]));
    }

    #[test]
    fn test_pvs_is_conservative() {
        let config = GeneratorConfig {
            rooms_x: 3,
            rooms_y: 1,
            rooms_z: 2,
            seed: 7,
            ..GeneratorConfig::default()
        };
        let sector = ProceduralGenerator::new(config).unwrap().generate("brute").unwrap();
        let mut tree = tree_for(&sector, 16);
        tree.build_pvs(&sector).unwrap();

        let bounds = sector.bounding_box().unwrap();
        let mut rng = StdRng::seed_from_u64(99);
        let point = |rng: &mut StdRng| -> Vec3 {
            Vec3::new(
                rng.random_range(bounds.min.x..bounds.max.x),
                rng.random_range(bounds.min.y..bounds.max.y),
                rng.random_range(bounds.min.z..bounds.max.z),
            )
        };
        let mut checked = 0;
        for _ in 0..400 {
            let from = point(&mut rng);
            let to = point(&mut rng);
            let blocked = sector
                .polygons()
                .iter()
                .filter(|p| p.occluder)
                .any(|p| p.polygon.intersect_segment(from, to).is_some());
            if blocked {
                continue;
            }
            checked += 1;
            let viewer = tree.locate_leaf(from).unwrap();
            let target = tree.locate_leaf(to).unwrap();
            assert!(
                tree.node(viewer).pvs().contains(target),
                "{:?} sees {:?} along {} -> {}",
                viewer,
                target,
                from,
                to
            );
        }
        assert!(checked > 0);
    }

    #[test]
    fn test_wall_on_split_plane_stays_visible() {
        // A full wall at x = 5.1 facing -x lands exactly on the root split
        // plane and is stored in the leaves on its front side.
        let mut sector = Sector::new("split wall");
        sector
            .add_wall(&Box3::new(Vec3::ZERO, Vec3::new(5.1, 10.0, 10.0)), Side::PosX, None)
            .unwrap();
        sector
            .add_wall(&Box3::new(Vec3::new(0.0, 2.0, 2.0), Vec3::new(1.0, 4.0, 4.0)), Side::PosX, None)
            .unwrap();
        sector
            .add_wall(&Box3::new(Vec3::new(0.0, 6.0, 5.0), Vec3::new(2.0, 8.0, 7.0)), Side::PosX, None)
            .unwrap();
        let bbox = Box3::new(Vec3::ZERO, Vec3::splat(10.0));
        let mut tree = Octree::new(bbox, OctreeConfig::default().with_bsp_threshold(1)).unwrap();
        tree.build(&sector).unwrap();
        tree.build_pvs(&sector).unwrap();
        assert_eq!(tree.node(NodeId(0)).center().x, 5.1);

        let wall_leaves: Vec<NodeId> = tree
            .leaves()
            .filter(|&id| tree.node(id).unsplit_polygons().contains(&PolygonId(0)))
            .collect();
        assert!(!wall_leaves.is_empty());

        let viewer = Box3::new(Vec3::ZERO, Vec3::new(2.0, 10.0, 10.0));
        for &leaf in &wall_leaves {
            let occludee = tree.node(leaf).bbox();
            assert_eq!(occludee.min.x, 5.1);
            assert!(tree.box_can_see_occludee(&sector, &viewer, occludee).unwrap());
            assert!(tree
                .box_can_see_occludee(&sector, &Box3::new(Vec3::ZERO, Vec3::new(2.0, 5.1, 5.1)), occludee)
                .unwrap());
        }
        for leaf in tree.leaves().filter(|&id| tree.node(id).bbox().max.x <= 5.1) {
            for &target in &wall_leaves {
                let entry = tree.node(leaf).pvs().entries().iter().find(|e| e.node == target);
                assert_eq!(entry.map(|e| e.polygons.clone()), Some(vec![PolygonId(0)]));
            }
        }

        // The same wall still hides what lies strictly behind it, even though
        // its umbra is flush with the edges of the hidden face.
        let behind = Box3::new(Vec3::new(6.0, 0.0, 0.0), Vec3::splat(10.0));
        assert!(!tree.box_can_see_occludee(&sector, &viewer, &behind).unwrap());
    }

    #[test]
    fn test_version_counter() {
        let (sector, [a, _, c]) = scenes::doorway_rooms();
        let mut tree = tree_for(&sector, 4);
        assert_eq!(tree.visibility_version(), 0);
        assert!(tree.visible_polygons().is_empty());
        tree.build_pvs(&sector).unwrap();

        assert_eq!(tree.mark_visible_from_pvs(a.center()).unwrap(), 1);
        let v2 = tree.mark_visible_from_pvs(c.center()).unwrap();
        assert_eq!(v2, 2);
        assert_eq!(tree.visibility_version(), 2);

        let leaf = tree.locate_leaf(c.center()).unwrap();
        let mut expected: Vec<NodeId> = tree.node(leaf).pvs().entries().iter().map(|e| e.node).collect();
        expected.sort();
        assert_eq!(tree.visible_nodes(), expected);

        let mut polygons: Vec<PolygonId> = tree
            .node(leaf)
            .pvs()
            .entries()
            .iter()
            .flat_map(|e| e.polygons.iter().copied())
            .collect();
        polygons.sort();
        polygons.dedup();
        assert_eq!(tree.visible_polygons(), polygons);
        assert!(!tree.is_polygon_visible(PolygonId(999)));
    }

    #[test]
    fn test_pvs_cull_restricts_traversal() {
        let (sector, [_, b, _]) = scenes::doorway_rooms();
        let mut tree = tree_for(&sector, 4);
        tree.build_pvs(&sector).unwrap();
        tree.mark_visible_from_pvs(b.center()).unwrap();

        let mut seen = Vec::new();
        let mut record = |node: &OctreeNode, _polygons: &[&PolygonStub]| -> Option<()> {
            seen.push(node.id());
            None
        };
        let cull = tree.pvs_cull();
        tree.front2back(b.center(), &mut record, cull).unwrap();
        let mut all = Vec::new();
        let mut record_all = |node: &OctreeNode, _polygons: &[&PolygonStub]| -> Option<()> {
            all.push(node.id());
            None
        };
        tree.front2back(b.center(), &mut record_all, NoCull).unwrap();

        assert!(seen.iter().all(|&id| tree.is_node_visible(id)));
        let visible_leaves = all.iter().filter(|&&id| tree.is_node_visible(id)).count();
        assert_eq!(seen.len(), visible_leaves);
    }

    #[test]
    fn test_pvs_errors() {
        let (sector, _) = scenes::doorway_rooms();
        let (other, _) = scenes::cube_room(4.0);
        let mut tree = Octree::new(sector.bounding_box().unwrap(), OctreeConfig::default()).unwrap();
        assert!(matches!(tree.build_pvs(&sector), Err(PvsError::NotBuilt)));
        assert!(matches!(
            tree.box_can_see_occludee(&sector, &Box3::new(Vec3::ZERO, Vec3::ONE), &Box3::new(Vec3::ONE, Vec3::splat(2.0))),
            Err(PvsError::NotBuilt)
        ));
        tree.build(&sector).unwrap();
        assert!(matches!(tree.mark_visible_from_pvs(Vec3::ONE), Err(PvsError::PvsNotBuilt)));
        assert!(matches!(
            tree.build_pvs(&other),
            Err(PvsError::SectorMismatch { expected: 24, actual: 6 })
        ));
        tree.build_pvs(&sector).unwrap();
        assert!(tree.is_pvs_built());
    }
}
