// src/bsp/bsp_tree.rs

use glam::Vec3;
use log::{trace, warn};
use serde::{Deserialize, Serialize};

use crate::bsp::{BspMode, BspNode, BspNodeId};
use crate::config::BSP_DEPTH_LIMIT;
use crate::geometry::{Plane3, PolygonPosition};
use crate::map::PolygonId;
use crate::octree::{PolygonStub, SpatialTree};

/// Counters describing the shape of one BSP tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BspStatistics {
    pub nodes: usize,
    pub leaves: usize,
    pub max_depth: usize,
    pub polygons: usize,
    pub max_polygons_in_node: usize,
    pub min_polygons_in_node: usize,
}

/// A small BSP tree over the polygons of one octree leaf. Node 0 is the root.
#[derive(Debug, Clone)]
pub struct BspTree {
    nodes: Vec<BspNode>,
    mode: BspMode,
}

impl BspTree {
    /// An empty tree, ready to receive stubs through its todo queue.
    pub fn new(mode: BspMode) -> Self {
        BspTree {
            nodes: vec![BspNode::empty_leaf()],
            mode,
        }
    }

    pub fn build(stubs: Vec<PolygonStub>, mode: BspMode) -> Self {
        let mut tree = BspTree {
            nodes: Vec::new(),
            mode,
        };
        tree.build_bsp_tree(stubs, 0);
        tree
    }

    pub fn mode(&self) -> BspMode {
        self.mode
    }

    pub fn node(&self, id: BspNodeId) -> &BspNode {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> &[BspNode] {
        &self.nodes
    }

    fn push(&mut self, node: BspNode) -> BspNodeId {
        self.nodes.push(node);
        BspNodeId(self.nodes.len() - 1)
    }

    fn build_bsp_tree(&mut self, stubs: Vec<PolygonStub>, depth: usize) -> BspNodeId {
        let id = self.push(BspNode::empty_leaf());
        if stubs.is_empty() {
            return id;
        }

        if depth >= BSP_DEPTH_LIMIT {
            warn!("BSP depth limit reached, keeping {} polygons in one leaf", stubs.len());
            self.nodes[id.0].polygons = stubs;
            return id;
        }

        let Some(partition) = self.choose_partition(&stubs) else {
            self.nodes[id.0].polygons = stubs;
            return id;
        };
        let (on_plane, front_stubs, back_stubs) = split_stubs(stubs, &partition);

        let front = self.build_bsp_tree(front_stubs, depth + 1);
        let back = self.build_bsp_tree(back_stubs, depth + 1);
        self.nodes[id.0] = BspNode::create_node(partition, front, back, on_plane);
        id
    }

    /// Pick the splitter among the polygon planes with the best score for
    /// the tree's mode; the first best candidate wins.
    fn choose_partition(&self, stubs: &[PolygonStub]) -> Option<Plane3> {
        let mut best: Option<(Plane3, (usize, usize))> = None;
        for candidate in stubs.iter().filter_map(|s| s.polygon.plane()) {
            let (mut front, mut back, mut splits) = (0, 0, 0);
            for stub in stubs {
                match stub.polygon.classify_plane(&candidate) {
                    PolygonPosition::Front => front += 1,
                    PolygonPosition::Back => back += 1,
                    PolygonPosition::Spanning => splits += 1,
                    PolygonPosition::Coincident => {}
                }
            }
            let score = self.mode.score(front, back, splits);
            if best.map_or(true, |(_, s)| score < s) {
                best = Some((candidate, score));
            }
        }
        best.map(|(plane, _)| plane)
    }

    /// Polygons in near-to-far order as seen from `pos`.
    pub fn front2back(&self, pos: Vec3) -> Vec<&PolygonStub> {
        let mut out = Vec::new();
        if !self.nodes.is_empty() {
            self.collect_ordered(BspNodeId(0), pos, &mut out);
        }
        out
    }

    /// Polygons in far-to-near order; the exact reverse of `front2back`.
    pub fn back2front(&self, pos: Vec3) -> Vec<&PolygonStub> {
        let mut out = self.front2back(pos);
        out.reverse();
        out
    }

    fn collect_ordered<'a>(&'a self, id: BspNodeId, pos: Vec3, out: &mut Vec<&'a PolygonStub>) {
        let node = &self.nodes[id.0];
        match (node.partition, node.front, node.back) {
            (Some(plane), Some(front), Some(back)) => {
                let (near, far) = if plane.distance(pos) >= 0.0 {
                    (front, back)
                } else {
                    (back, front)
                };
                self.collect_ordered(near, pos, out);
                out.extend(node.polygons.iter());
                self.collect_ordered(far, pos, out);
            }
            _ => out.extend(node.polygons.iter()),
        }
    }

    /// Classify every queued stub down to where it belongs. Children always
    /// have higher indices than their parent, so one pass in index order
    /// reaches the bottom.
    pub fn process_all_todo(&mut self) -> usize {
        let mut processed = 0;
        let mut i = 0;
        while i < self.nodes.len() {
            processed += self.process_todo(BspNodeId(i));
            i += 1;
        }
        processed
    }

    /// Distinct ids of the original polygons stored in the tree.
    pub fn polygon_ids(&self) -> Vec<PolygonId> {
        let mut ids: Vec<PolygonId> = self
            .nodes
            .iter()
            .flat_map(|n| n.polygons.iter().map(|s| s.id))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Number of stored polygon fragments.
    pub fn polygon_count(&self) -> usize {
        self.nodes.iter().map(|n| n.polygons.len()).sum()
    }

    pub fn statistics(&self) -> BspStatistics {
        let mut stats = BspStatistics {
            min_polygons_in_node: usize::MAX,
            ..BspStatistics::default()
        };
        if !self.nodes.is_empty() {
            self.statistics_node(BspNodeId(0), 1, &mut stats);
        }
        if stats.nodes == 0 {
            stats.min_polygons_in_node = 0;
        }
        stats
    }

    fn statistics_node(&self, id: BspNodeId, depth: usize, stats: &mut BspStatistics) {
        let node = &self.nodes[id.0];
        stats.nodes += 1;
        stats.max_depth = stats.max_depth.max(depth);
        stats.polygons += node.polygons.len();
        stats.max_polygons_in_node = stats.max_polygons_in_node.max(node.polygons.len());
        stats.min_polygons_in_node = stats.min_polygons_in_node.min(node.polygons.len());
        if node.is_leaf() {
            stats.leaves += 1;
        }
        for child in [node.front, node.back].into_iter().flatten() {
            self.statistics_node(child, depth + 1, stats);
        }
    }
}

/// Sort stubs into those lying in `partition` and those in front of and
/// behind it, splitting the ones that span it.
fn split_stubs(
    stubs: Vec<PolygonStub>,
    partition: &Plane3,
) -> (Vec<PolygonStub>, Vec<PolygonStub>, Vec<PolygonStub>) {
    let mut on_plane = Vec::new();
    let mut front_stubs = Vec::new();
    let mut back_stubs = Vec::new();

    for stub in stubs {
        if stub.polygon.plane().is_none() {
            on_plane.push(stub);
            continue;
        }
        match stub.polygon.classify_plane(partition) {
            PolygonPosition::Coincident => on_plane.push(stub),
            PolygonPosition::Front => front_stubs.push(stub),
            PolygonPosition::Back => back_stubs.push(stub),
            PolygonPosition::Spanning => {
                let (front, back) = stub.split_with_plane(partition);
                front_stubs.extend(front);
                back_stubs.extend(back);
            }
        }
    }
    (on_plane, front_stubs, back_stubs)
}

impl SpatialTree for BspTree {
    type Handle = BspNodeId;

    fn root_handle(&self) -> Option<BspNodeId> {
        (!self.nodes.is_empty()).then_some(BspNodeId(0))
    }

    fn todo_mut(&mut self, handle: BspNodeId) -> &mut Vec<PolygonStub> {
        &mut self.nodes[handle.0].todo
    }

    fn pending_count(&self) -> usize {
        self.nodes.iter().map(|n| n.todo.len()).sum()
    }

    fn classify_todo(&mut self, handle: BspNodeId, stub: PolygonStub) {
        let node = &self.nodes[handle.0];
        match (node.partition, node.front, node.back) {
            (Some(plane), Some(front), Some(back)) => match stub.polygon.classify_plane(&plane) {
                PolygonPosition::Coincident => self.nodes[handle.0].polygons.push(stub),
                PolygonPosition::Front => self.link_stub_todo(front, stub),
                PolygonPosition::Back => self.link_stub_todo(back, stub),
                PolygonPosition::Spanning => {
                    let (f, b) = stub.split_with_plane(&plane);
                    if let Some(f) = f {
                        self.link_stub_todo(front, f);
                    }
                    if let Some(b) = b {
                        self.link_stub_todo(back, b);
                    }
                }
            },
            _ => {
                let plane = stub.polygon.plane();
                match plane {
                    Some(plane) if node.polygons.is_empty() => {
                        trace!("BSP leaf {:?} becomes a node for stub {}", handle, stub.id);
                        let front = self.push(BspNode::empty_leaf());
                        let back = self.push(BspNode::empty_leaf());
                        self.nodes[handle.0] = BspNode::create_node(plane, front, back, vec![stub]);
                    }
                    _ => self.nodes[handle.0].polygons.push(stub),
                }
            }
        }
    }
}
