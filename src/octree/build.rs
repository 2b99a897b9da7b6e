// src/octree/build.rs

use glam::Vec3;
use log::{debug, info, warn};

use crate::bsp::BspTree;
use crate::config::EPSILON;
use crate::error::{PvsError, Result};
use crate::geometry::{Axis, Box3, PolygonPosition};
use crate::map::{PolygonId, Sector};
use crate::octree::{NodeId, Octree, OctreeNode, PolygonStub};
use crate::utils::util::dedup_sorted;

/// Split `stub` by the three planes through `center`, first on x, then each
/// half on y, then on z. Returns the pieces with their octant index.
pub(crate) fn split_to_octants(stub: PolygonStub, center: Vec3) -> Vec<(usize, PolygonStub)> {
    let mut parts = vec![(0usize, stub)];
    for axis in Axis::ALL {
        let value = center[axis.index()];
        parts = parts
            .into_iter()
            .flat_map(|(octant, part)| {
                let (front, back) = part.split_with_plane_axis(axis, value);
                front
                    .map(|f| (octant | axis.octant_bit(), f))
                    .into_iter()
                    .chain(back.map(|b| (octant, b)))
            })
            .collect();
    }
    parts
}

fn distinct_ids(stubs: &[PolygonStub]) -> Vec<PolygonId> {
    let mut ids: Vec<PolygonId> = stubs.iter().map(|s| s.id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

impl Octree {
    /// Build the tree from every polygon of `sector`.
    pub fn build(&mut self, sector: &Sector) -> Result<()> {
        self.build_from_stubs(sector.stubs(), sector.polygon_count())
    }

    /// Build from an explicit stub list. Stub ids must be below `polygon_count`.
    pub fn build_from_stubs(&mut self, stubs: Vec<PolygonStub>, polygon_count: usize) -> Result<()> {
        if self.is_built() {
            return Err(PvsError::AlreadyBuilt);
        }
        if let Some(bad) = stubs.iter().find(|s| s.id.0 >= polygon_count) {
            return Err(PvsError::UnknownPolygon(bad.id));
        }

        self.polygon_count = polygon_count;
        self.polygon_stamps = vec![0; polygon_count];
        self.vis_counter = 0;
        self.pvs_built = false;

        let count = stubs.len();
        let bbox = self.bbox;
        self.build_node(bbox, stubs, 0, 0);
        info!(
            "built octree from {} polygons: {} nodes, {} leaves",
            count,
            self.nodes.len(),
            self.leaves().count()
        );
        Ok(())
    }

    /// `stalls` counts the splits in a row that gave this node every polygon
    /// of its parent.
    fn build_node(&mut self, bbox: Box3, stubs: Vec<PolygonStub>, depth: usize, stalls: usize) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(OctreeNode::new(id, bbox, depth));
        if stubs.is_empty() {
            return id;
        }

        let unsplit = distinct_ids(&stubs);
        let polygon_count = unsplit.len();
        self.nodes[id.0].unsplit_polygons = unsplit;

        let stalled = stalls > self.config.max_stalled_splits;
        if stubs.len() <= self.config.bsp_threshold || depth >= self.config.max_depth || stalled {
            if stalled {
                debug!(
                    "{:?}: {} splits kept all {} polygons together, stopping",
                    id, stalls, polygon_count
                );
            } else if stubs.len() > self.config.bsp_threshold {
                warn!(
                    "octree depth limit {} reached with {} polygons in {:?}",
                    self.config.max_depth,
                    stubs.len(),
                    id
                );
            }
            debug!("leaf {:?} at depth {} gets a mini BSP of {} polygons", id, depth, stubs.len());
            self.nodes[id.0].mini_bsp = Some(BspTree::build(stubs, self.config.bsp_mode));
            return id;
        }

        let center = self.choose_best_center(&bbox, &stubs);
        self.nodes[id.0].center = center;

        let mut lists: [Vec<PolygonStub>; 8] = Default::default();
        for stub in stubs {
            for (octant, part) in split_to_octants(stub, center) {
                lists[octant].push(part);
            }
        }

        let mut children = [NodeId(0); 8];
        for (octant, list) in lists.into_iter().enumerate() {
            let child_stalls = if distinct_ids(&list).len() == polygon_count {
                stalls + 1
            } else {
                0
            };
            children[octant] = self.build_node(bbox.octant(center, octant), list, depth + 1, child_stalls);
        }
        self.nodes[id.0].children = Some(children);
        id
    }

    /// Per axis, try vertex coordinates near the middle of the box and keep
    /// the one cutting the fewest polygons. The first minimum wins.
    fn choose_best_center(&self, bbox: &Box3, stubs: &[PolygonStub]) -> Vec3 {
        let orig = bbox.center();
        let reach = bbox.size() * self.config.center_window;
        let window = Box3::new(orig - reach, orig + reach);
        let mut best_center = orig;

        for axis in Axis::ALL {
            let i = axis.index();
            let mut candidates: Vec<f32> = stubs
                .iter()
                .flat_map(|s| s.polygon.vertices.iter())
                .map(|v| v[i])
                .filter(|&c| c >= window.min[i] && c <= window.max[i])
                .collect();
            candidates.push(orig[i]);
            candidates.sort_by(f32::total_cmp);
            dedup_sorted(&mut candidates, EPSILON);

            let mut best_splits = usize::MAX;
            for candidate in candidates {
                let value = candidate + self.config.split_offset;
                if !(value > bbox.min[i] && value < bbox.max[i]) {
                    continue;
                }
                let splits = stubs
                    .iter()
                    .filter(|s| s.polygon.classify_axis(axis, value) == PolygonPosition::Spanning)
                    .count();
                if splits < best_splits {
                    best_center[i] = value;
                    best_splits = splits;
                }
            }
        }
        best_center
    }
}
