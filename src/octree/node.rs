// src/octree/node.rs

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::bsp::BspTree;
use crate::geometry::{Axis, Box3};
use crate::map::PolygonId;
use crate::octree::PolygonStub;

/// Index of a node in its octree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// "This node, and these polygons in it, are potentially visible."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PvsEntry {
    pub node: NodeId,
    pub polygons: Vec<PolygonId>,
}

/// Potentially visible set of one leaf.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pvs {
    entries: Vec<PvsEntry>,
}

impl Pvs {
    pub fn add(&mut self, node: NodeId, polygons: Vec<PolygonId>) {
        self.entries.push(PvsEntry { node, polygons });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[PvsEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.entries.iter().any(|e| e.node == node)
    }
}

#[derive(Debug, Clone)]
pub struct OctreeNode {
    pub(crate) id: NodeId,
    pub(crate) bbox: Box3,
    pub(crate) center: Vec3,
    pub(crate) depth: usize,
    pub(crate) children: Option<[NodeId; 8]>,
    pub(crate) mini_bsp: Option<BspTree>,
    pub(crate) todo: Vec<PolygonStub>,
    pub(crate) unsplit_polygons: Vec<PolygonId>,
    pub(crate) pvs: Pvs,
    pub(crate) visibility_stamp: u64,
}

impl OctreeNode {
    pub(crate) fn new(id: NodeId, bbox: Box3, depth: usize) -> Self {
        OctreeNode {
            id,
            bbox,
            center: bbox.center(),
            depth,
            children: None,
            mini_bsp: None,
            todo: Vec::new(),
            unsplit_polygons: Vec::new(),
            pvs: Pvs::default(),
            visibility_stamp: 0,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn bbox(&self) -> &Box3 {
        &self.bbox
    }

    /// Split point shared by the three planes dividing the node.
    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn children(&self) -> Option<&[NodeId; 8]> {
        self.children.as_ref()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    pub fn mini_bsp(&self) -> Option<&BspTree> {
        self.mini_bsp.as_ref()
    }

    /// Distinct original polygons that reached this node during the build.
    pub fn unsplit_polygons(&self) -> &[PolygonId] {
        &self.unsplit_polygons
    }

    pub fn pvs(&self) -> &Pvs {
        &self.pvs
    }

    pub fn visibility_stamp(&self) -> u64 {
        self.visibility_stamp
    }

    pub fn pending_stubs(&self) -> &[PolygonStub] {
        &self.todo
    }

    /// Octant of `pos` relative to the node center: bit 4 for x, 2 for y,
    /// 1 for z, set on the greater side.
    pub fn octant_of(&self, pos: Vec3) -> usize {
        Axis::ALL
            .into_iter()
            .filter(|a| pos[a.index()] > self.center[a.index()])
            .map(|a| a.octant_bit())
            .sum()
    }
}
