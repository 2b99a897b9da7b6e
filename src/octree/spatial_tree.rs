// src/octree/spatial_tree.rs
//! Pending polygon queues shared by the octree and the embedded BSPs.
//!
//! Polygons added after a build are not classified right away. They are
//! queued on the root and pushed one level down every time traversal enters
//! a node, so the split work is only done for parts of the tree that are
//! actually visited.

use serde::{Deserialize, Serialize};

use crate::error::{PvsError, Result};
use crate::geometry::{Axis, Plane3, Polygon3};
use crate::map::PolygonId;

/// A polygon, or a fragment of one, referencing its original sector polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonStub {
    pub id: PolygonId,
    pub polygon: Polygon3,
}

impl PolygonStub {
    pub fn new(id: PolygonId, polygon: Polygon3) -> Self {
        PolygonStub { id, polygon }
    }

    fn with_polygon(&self, polygon: Option<Polygon3>) -> Option<PolygonStub> {
        polygon.map(|polygon| PolygonStub { id: self.id, polygon })
    }

    pub fn split_with_plane(&self, plane: &Plane3) -> (Option<PolygonStub>, Option<PolygonStub>) {
        let (front, back) = self.polygon.split_with_plane(plane);
        (self.with_polygon(front), self.with_polygon(back))
    }

    pub fn split_with_plane_axis(&self, axis: Axis, value: f32) -> (Option<PolygonStub>, Option<PolygonStub>) {
        self.split_with_plane(&Plane3::axis(axis, value))
    }
}

pub trait SpatialTree {
    type Handle: Copy;

    fn root_handle(&self) -> Option<Self::Handle>;

    fn todo_mut(&mut self, handle: Self::Handle) -> &mut Vec<PolygonStub>;

    /// Stubs still waiting in some queue.
    fn pending_count(&self) -> usize;

    /// Move one stub from `handle`'s queue to wherever it belongs next.
    fn classify_todo(&mut self, handle: Self::Handle, stub: PolygonStub);

    fn link_stub_todo(&mut self, handle: Self::Handle, stub: PolygonStub) {
        self.todo_mut(handle).push(stub);
    }

    /// Drain the queue of `handle`, returning how many stubs were moved.
    fn process_todo(&mut self, handle: Self::Handle) -> usize {
        let pending = std::mem::take(self.todo_mut(handle));
        let count = pending.len();
        for stub in pending {
            self.classify_todo(handle, stub);
        }
        count
    }

    /// Queue a new polygon on the root.
    fn add_stub(&mut self, stub: PolygonStub) -> Result<()> {
        let root = self.root_handle().ok_or(PvsError::NotBuilt)?;
        self.link_stub_todo(root, stub);
        Ok(())
    }
}
