//! src/bsp/bsp_node.rs

use crate::geometry::Plane3;
use crate::octree::PolygonStub;

/// Index of a node in its `BspTree` arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BspNodeId(pub usize);

/// A node in the BSP tree. Each node has:
/// - An optional `partition` plane (None for leaves).
/// - A `front` and a `back` child when it has a partition.
/// - The `polygons` lying in its partition plane, or for a leaf the
///   polygons that could not be partitioned further.
/// - A queue of stubs added after the build, classified on traversal.
#[derive(Debug, Clone)]
pub struct BspNode {
    pub partition: Option<Plane3>,
    pub front: Option<BspNodeId>,
    pub back: Option<BspNodeId>,
    pub polygons: Vec<PolygonStub>,
    pub todo: Vec<PolygonStub>,
}

impl BspNode {
    /// Create a leaf node with the given polygons.
    pub fn create_leaf(polygons: Vec<PolygonStub>) -> Self {
        BspNode {
            partition: None,
            front: None,
            back: None,
            polygons,
            todo: Vec::new(),
        }
    }

    /// Create an internal node holding the polygons coincident with its
    /// partition plane.
    pub fn create_node(partition: Plane3, front: BspNodeId, back: BspNodeId, polygons: Vec<PolygonStub>) -> Self {
        BspNode {
            partition: Some(partition),
            front: Some(front),
            back: Some(back),
            polygons,
            todo: Vec::new(),
        }
    }

    pub fn empty_leaf() -> Self {
        Self::create_leaf(Vec::new())
    }

    /// Returns `true` if `self` is a leaf (i.e. `partition.is_none()`).
    pub fn is_leaf(&self) -> bool {
        self.partition.is_none()
    }
}
