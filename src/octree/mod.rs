// src/octree/mod.rs
//! Octree over a sector's polygons, with mini BSPs in small leaves and a
//! per-leaf potentially visible set.

pub mod build;
pub mod node;
pub mod pvs;
pub mod spatial_tree;
pub mod stats;
pub mod traverse;

pub use node::{NodeId, OctreeNode, Pvs, PvsEntry};
pub use spatial_tree::{PolygonStub, SpatialTree};
pub use stats::{OctreeStatistics, Tally};
pub use traverse::{CullPredicate, NoCull, PvsCull, SegmentHit, Visitor};

use glam::Vec3;
use log::trace;

use crate::bsp::BspTree;
use crate::config::OctreeConfig;
use crate::error::{PvsError, Result};
use crate::geometry::Box3;

pub struct Octree {
    bbox: Box3,
    config: OctreeConfig,
    nodes: Vec<OctreeNode>,
    polygon_count: usize,
    pvs_built: bool,
    /// Bumped once per visibility query; nodes and polygons stamped with the
    /// current value are visible.
    vis_counter: u64,
    polygon_stamps: Vec<u64>,
}

impl Octree {
    pub fn new(bbox: Box3, config: OctreeConfig) -> Result<Self> {
        if bbox.is_empty() {
            return Err(PvsError::EmptyBox {
                min: bbox.min,
                max: bbox.max,
            });
        }
        Ok(Octree {
            bbox,
            config,
            nodes: Vec::new(),
            polygon_count: 0,
            pvs_built: false,
            vis_counter: 0,
            polygon_stamps: Vec::new(),
        })
    }

    pub fn bbox(&self) -> &Box3 {
        &self.bbox
    }

    pub fn config(&self) -> &OctreeConfig {
        &self.config
    }

    pub fn is_built(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub fn is_pvs_built(&self) -> bool {
        self.pvs_built
    }

    /// Number of sector polygons the tree was built from.
    pub fn polygon_count(&self) -> usize {
        self.polygon_count
    }

    /// Drop all nodes so the tree can be built again.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.polygon_count = 0;
        self.pvs_built = false;
        self.vis_counter = 0;
        self.polygon_stamps.clear();
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root_handle()
    }

    /// The node with `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this tree; use [`Octree::get_node`]
    /// for ids from elsewhere.
    pub fn node(&self, id: NodeId) -> &OctreeNode {
        &self.nodes[id.0]
    }

    /// The node with `id`, or `None` for an id outside this tree.
    pub fn get_node(&self, id: NodeId) -> Option<&OctreeNode> {
        self.nodes.get(id.0)
    }

    pub fn nodes(&self) -> &[OctreeNode] {
        &self.nodes
    }

    pub fn leaves(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().filter(|n| n.is_leaf()).map(|n| n.id)
    }

    /// The leaf whose octant path contains `pos`.
    pub fn locate_leaf(&self, pos: Vec3) -> Option<NodeId> {
        let mut id = self.root()?;
        while let Some(children) = self.nodes[id.0].children {
            id = children[self.nodes[id.0].octant_of(pos)];
        }
        Some(id)
    }
}

impl SpatialTree for Octree {
    type Handle = NodeId;

    fn root_handle(&self) -> Option<NodeId> {
        (!self.nodes.is_empty()).then_some(NodeId(0))
    }

    fn todo_mut(&mut self, handle: NodeId) -> &mut Vec<PolygonStub> {
        &mut self.nodes[handle.0].todo
    }

    fn pending_count(&self) -> usize {
        self.nodes
            .iter()
            .map(|n| n.todo.len() + n.mini_bsp.as_ref().map_or(0, |b| b.pending_count()))
            .sum()
    }

    fn classify_todo(&mut self, handle: NodeId, stub: PolygonStub) {
        let mode = self.config.bsp_mode;
        let node = &mut self.nodes[handle.0];
        match node.children {
            Some(children) => {
                let center = node.center;
                for (octant, part) in build::split_to_octants(stub, center) {
                    self.link_stub_todo(children[octant], part);
                }
            }
            None => {
                let bsp = node.mini_bsp.get_or_insert_with(|| {
                    trace!("creating mini BSP for leaf {:?}", handle);
                    BspTree::new(mode)
                });
                if let Some(root) = bsp.root_handle() {
                    bsp.link_stub_todo(root, stub);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::sector::scenes;

    #[test]
    fn test_get_node_rejects_foreign_id() {
        let (sector, room) = scenes::cube_room(4.0);
        let mut tree = Octree::new(room, OctreeConfig::default()).unwrap();
        assert!(tree.get_node(NodeId(0)).is_none());
        tree.build(&sector).unwrap();
        assert_eq!(tree.get_node(NodeId(0)).map(|n| n.id()), Some(NodeId(0)));
        assert!(tree.get_node(NodeId(tree.nodes().len())).is_none());
    }

    #[test]
    #[should_panic]
    fn test_node_panics_on_foreign_id() {
        let (sector, room) = scenes::cube_room(4.0);
        let mut tree = Octree::new(room, OctreeConfig::default()).unwrap();
        tree.build(&sector).unwrap();
        tree.node(NodeId(99));
    }
}
