// src/octree/traverse.rs

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{PvsError, Result};
use crate::map::PolygonId;
use crate::octree::{NodeId, Octree, OctreeNode, PolygonStub, SpatialTree};

/// Children of a node in near-to-far order, as offsets XOR-ed with the
/// octant holding the viewpoint.
const FRONT_TO_BACK: [usize; 8] = [0, 1, 2, 4, 6, 5, 3, 7];

/// Called once for every leaf reached by a traversal, with the leaf's
/// polygons in the traversal order. Returning `Some` stops the walk.
pub trait Visitor {
    type Output;

    fn visit(&mut self, node: &OctreeNode, polygons: &[&PolygonStub]) -> Option<Self::Output>;
}

impl<F, T> Visitor for F
where
    F: FnMut(&OctreeNode, &[&PolygonStub]) -> Option<T>,
{
    type Output = T;

    fn visit(&mut self, node: &OctreeNode, polygons: &[&PolygonStub]) -> Option<T> {
        self(node, polygons)
    }
}

/// Consulted before entering any node; `false` skips the node and
/// everything below it.
pub trait CullPredicate {
    fn test(&mut self, node: &OctreeNode, pos: Vec3) -> bool;
}

impl<F> CullPredicate for F
where
    F: FnMut(&OctreeNode, Vec3) -> bool,
{
    fn test(&mut self, node: &OctreeNode, pos: Vec3) -> bool {
        self(node, pos)
    }
}

/// Accepts every node.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCull;

impl CullPredicate for NoCull {
    fn test(&mut self, _node: &OctreeNode, _pos: Vec3) -> bool {
        true
    }
}

/// Accepts only nodes stamped by the visibility query that produced
/// `version`.
#[derive(Debug, Clone, Copy)]
pub struct PvsCull {
    pub version: u64,
}

impl CullPredicate for PvsCull {
    fn test(&mut self, node: &OctreeNode, _pos: Vec3) -> bool {
        node.visibility_stamp == self.version
    }
}

/// Nearest polygon crossed by a segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentHit {
    pub polygon: PolygonId,
    pub point: Vec3,
    /// Segment parameter of `point`, 0 at the start.
    pub t: f32,
}

#[derive(Clone, Copy)]
enum Order {
    FrontToBack,
    BackToFront,
}

impl Octree {
    /// Walk the leaves from near to far as seen from `pos`.
    pub fn front2back<V, C>(&mut self, pos: Vec3, visitor: &mut V, mut cull: C) -> Result<Option<V::Output>>
    where
        V: Visitor,
        C: CullPredicate,
    {
        let root = self.root().ok_or(PvsError::NotBuilt)?;
        Ok(self.traverse(root, pos, Order::FrontToBack, visitor, &mut cull))
    }

    /// Walk the leaves from far to near; the exact reverse of `front2back`.
    pub fn back2front<V, C>(&mut self, pos: Vec3, visitor: &mut V, mut cull: C) -> Result<Option<V::Output>>
    where
        V: Visitor,
        C: CullPredicate,
    {
        let root = self.root().ok_or(PvsError::NotBuilt)?;
        Ok(self.traverse(root, pos, Order::BackToFront, visitor, &mut cull))
    }

    fn traverse<V, C>(&mut self, id: NodeId, pos: Vec3, order: Order, visitor: &mut V, cull: &mut C) -> Option<V::Output>
    where
        V: Visitor,
        C: CullPredicate,
    {
        if !cull.test(&self.nodes[id.0], pos) {
            return None;
        }
        self.process_todo(id);

        if let Some(children) = self.nodes[id.0].children {
            let octant = self.nodes[id.0].octant_of(pos);
            let mut sequence = FRONT_TO_BACK.map(|offset| octant ^ offset);
            if let Order::BackToFront = order {
                sequence.reverse();
            }
            for child in sequence {
                if let Some(found) = self.traverse(children[child], pos, order, visitor, cull) {
                    return Some(found);
                }
            }
            return None;
        }

        if let Some(bsp) = self.nodes[id.0].mini_bsp.as_mut() {
            bsp.process_all_todo();
        }
        let node = &self.nodes[id.0];
        let polygons = match (&node.mini_bsp, order) {
            (Some(bsp), Order::FrontToBack) => bsp.front2back(pos),
            (Some(bsp), Order::BackToFront) => bsp.back2front(pos),
            (None, _) => Vec::new(),
        };
        visitor.visit(node, &polygons)
    }

    /// First polygon crossed by the segment `start..end`.
    pub fn intersect_segment(&mut self, start: Vec3, end: Vec3) -> Result<Option<SegmentHit>> {
        let mut nearest = |_node: &OctreeNode, polygons: &[&PolygonStub]| -> Option<SegmentHit> {
            polygons
                .iter()
                .filter_map(|stub| {
                    stub.polygon
                        .intersect_segment(start, end)
                        .map(|(t, point)| SegmentHit { polygon: stub.id, point, t })
                })
                .min_by(|a, b| a.t.total_cmp(&b.t))
        };
        let on_segment = |node: &OctreeNode, _pos: Vec3| node.bbox.intersects_segment(start, end);
        self.front2back(start, &mut nearest, on_segment)
    }

    /// Cull predicate for the result of the last `mark_visible_from_pvs`.
    pub fn pvs_cull(&self) -> PvsCull {
        PvsCull {
            version: self.vis_counter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OctreeConfig;
    use crate::geometry::{Box3, Polygon3};
    use crate::map::sector::scenes;
    use crate::map::{GeneratorConfig, ProceduralGenerator, Sector};

    fn tree_for(sector: &Sector, threshold: usize) -> Octree {
        let bbox = sector.bounding_box().unwrap().expanded(1.0);
        let mut tree = Octree::new(bbox, OctreeConfig::default().with_bsp_threshold(threshold)).unwrap();
        tree.build(sector).unwrap();
        tree
    }

    fn generated() -> Sector {
        let config = GeneratorConfig {
            rooms_x: 3,
            rooms_y: 1,
            rooms_z: 3,
            seed: 21,
            ..GeneratorConfig::default()
        };
        ProceduralGenerator::new(config).unwrap().generate("walk").unwrap()
    }

    fn leaf_order(tree: &mut Octree, pos: Vec3, front: bool) -> Vec<NodeId> {
        let mut seen = Vec::new();
        let mut record = |node: &OctreeNode, _polygons: &[&PolygonStub]| -> Option<()> {
            seen.push(node.id());
            None
        };
        if front {
            tree.front2back(pos, &mut record, NoCull).unwrap();
        } else {
            tree.back2front(pos, &mut record, NoCull).unwrap();
        }
        seen
    }

    #[test]
    fn test_traversal_visits_every_leaf_once() {
        let sector = generated();
        let mut tree = tree_for(&sector, 6);
        let pos = tree.bbox().center() + Vec3::new(3.0, 0.5, -7.0);
        let forward = leaf_order(&mut tree, pos, true);
        let mut sorted = forward.clone();
        sorted.sort();
        sorted.dedup();
        let mut leaves: Vec<NodeId> = tree.leaves().collect();
        leaves.sort();
        assert_eq!(sorted, leaves);
        assert_eq!(forward.len(), leaves.len());

        let mut backward = leaf_order(&mut tree, pos, false);
        backward.reverse();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_first_leaf_contains_position() {
        let sector = generated();
        let mut tree = tree_for(&sector, 6);
        let pos = tree.bbox().min + Vec3::splat(2.0);
        let order = leaf_order(&mut tree, pos, true);
        assert_eq!(Some(order[0]), tree.locate_leaf(pos));
        assert!(tree.node(order[0]).bbox().contains_point(pos));
    }

    #[test]
    fn test_cull_prunes_subtree() {
        let (sector, _) = scenes::cube_room(10.0);
        let mut tree = tree_for(&sector, 4);
        let root_children = *tree.node(NodeId(0)).children().unwrap();
        let skipped = root_children[7];
        let mut seen = Vec::new();
        let mut record = |node: &OctreeNode, _polygons: &[&PolygonStub]| -> Option<()> {
            seen.push(node.id());
            None
        };
        let cull = |node: &OctreeNode, _pos: Vec3| node.id() != skipped;
        tree.front2back(Vec3::splat(1.0), &mut record, cull).unwrap();
        assert!(!seen.contains(&skipped));
        assert_eq!(seen.len(), tree.leaves().count() - 1);
    }

    #[test]
    fn test_visitor_stops_early() {
        let sector = generated();
        let mut tree = tree_for(&sector, 6);
        let mut calls = 0;
        let mut third = |node: &OctreeNode, _polygons: &[&PolygonStub]| -> Option<NodeId> {
            calls += 1;
            (calls == 3).then_some(node.id())
        };
        let found = tree.front2back(tree.bbox().center(), &mut third, NoCull).unwrap();
        assert!(found.is_some());
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_leaf_polygons_in_bsp_order() {
        let (sector, room) = scenes::cube_room(10.0);
        let mut tree = tree_for(&sector, 30);
        let mut ids = Vec::new();
        let mut record = |_node: &OctreeNode, polygons: &[&PolygonStub]| -> Option<()> {
            ids.extend(polygons.iter().map(|s| s.id));
            None
        };
        tree.front2back(room.center(), &mut record, NoCull).unwrap();
        let expected: Vec<PolygonId> = tree
            .node(NodeId(0))
            .mini_bsp()
            .unwrap()
            .front2back(room.center())
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, expected);
        assert_eq!(ids.len(), 6);
    }

    #[test]
    fn test_traversal_before_build_fails() {
        let mut tree = Octree::new(Box3::new(Vec3::ZERO, Vec3::ONE), OctreeConfig::default()).unwrap();
        let mut visit = |_node: &OctreeNode, _polygons: &[&PolygonStub]| -> Option<()> { None };
        assert!(matches!(
            tree.front2back(Vec3::ZERO, &mut visit, NoCull),
            Err(PvsError::NotBuilt)
        ));
    }

    #[test]
    fn test_segment_hits_near_wall() {
        let (sector, room) = scenes::cube_room(10.0);
        let mut tree = tree_for(&sector, 4);
        let start = room.center();
        let hit = tree
            .intersect_segment(start, start + Vec3::new(10.0, 0.0, 0.0))
            .unwrap()
            .unwrap();
        assert_eq!(hit.polygon, PolygonId(1));
        assert!((hit.point.x - 10.0).abs() < 1e-4);
        assert!((hit.t - 0.5).abs() < 1e-4);

        let miss = tree.intersect_segment(start, start + Vec3::new(1.0, 1.0, 1.0)).unwrap();
        assert!(miss.is_none());
    }

    #[test]
    fn test_added_stub_reaches_leaf_on_traversal() {
        let (sector, room) = scenes::cube_room(10.0);
        let mut tree = tree_for(&sector, 4);
        let dynamic = Polygon3::new(vec![
            Vec3::new(2.0, 2.0, 3.0),
            Vec3::new(8.0, 2.0, 3.0),
            Vec3::new(8.0, 8.0, 3.0),
            Vec3::new(2.0, 8.0, 3.0),
        ]);
        tree.add_stub(PolygonStub::new(PolygonId(6), dynamic)).unwrap();
        assert_eq!(tree.node(NodeId(0)).pending_stubs().len(), 1);

        let mut fragments = 0;
        let mut count = |_node: &OctreeNode, polygons: &[&PolygonStub]| -> Option<()> {
            fragments += polygons.iter().filter(|s| s.id == PolygonId(6)).count();
            None
        };
        tree.front2back(room.center(), &mut count, NoCull).unwrap();
        // Split by the x and y planes of the root, below the z plane.
        assert_eq!(fragments, 4);
        assert_eq!(tree.pending_count(), 0);

        let hit = tree
            .intersect_segment(Vec3::new(5.0, 5.0, 9.0), Vec3::new(5.0, 5.0, 0.5))
            .unwrap()
            .unwrap();
        assert_eq!(hit.polygon, PolygonId(6));
    }
}
