// src/octree/stats.rs

use std::fmt;

use itertools::{Itertools, MinMaxResult};
use log::info;
use serde::Serialize;

use crate::bsp::BspStatistics;
use crate::octree::{NodeId, Octree, SpatialTree};

/// Sum, mean and range of one counter over all embedded BSPs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Tally {
    pub total: usize,
    pub avg: f32,
    pub min: usize,
    pub max: usize,
}

impl Tally {
    fn from_counts(counts: &[usize]) -> Self {
        let (min, max) = match counts.iter().copied().minmax() {
            MinMaxResult::NoElements => (0, 0),
            MinMaxResult::OneElement(x) => (x, x),
            MinMaxResult::MinMax(lo, hi) => (lo, hi),
        };
        let total: usize = counts.iter().sum();
        Tally {
            total,
            avg: if counts.is_empty() { 0.0 } else { total as f32 / counts.len() as f32 },
            min,
            max,
        }
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tot={} avg={:.1} min={} max={}", self.total, self.avg, self.min, self.max)
    }
}

/// Shape counters used to tune the leaf threshold.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OctreeStatistics {
    pub nodes: usize,
    pub leaves: usize,
    pub empty_leaves: usize,
    /// Deepest level, the root being level 1.
    pub max_depth: usize,
    pub bsp_trees: usize,
    pub bsp_nodes: Tally,
    pub bsp_leaves: Tally,
    pub bsp_max_depth: Tally,
    pub bsp_polygons: Tally,
    pub pvs_entries: usize,
    pub pending_stubs: usize,
}

impl fmt::Display for OctreeStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  oct_nodes={} leaves={} (empty {}) max_oct_depth={} num_bsp_trees={}",
            self.nodes, self.leaves, self.empty_leaves, self.max_depth, self.bsp_trees
        )?;
        writeln!(f, "  bsp nodes: {}", self.bsp_nodes)?;
        writeln!(f, "  bsp leaves: {}", self.bsp_leaves)?;
        writeln!(f, "  bsp max depth: {}", self.bsp_max_depth)?;
        writeln!(f, "  bsp tot poly: {}", self.bsp_polygons)?;
        write!(f, "  pvs entries={} pending stubs={}", self.pvs_entries, self.pending_stubs)
    }
}

impl Octree {
    /// Collect shape counters and log them.
    pub fn statistics(&self) -> OctreeStatistics {
        let bsp: Vec<_> = self
            .nodes
            .iter()
            .filter_map(|n| n.mini_bsp.as_ref())
            .map(|b| b.statistics())
            .collect();
        let tally = |f: fn(&BspStatistics) -> usize| {
            Tally::from_counts(&bsp.iter().map(f).collect::<Vec<_>>())
        };

        let stats = OctreeStatistics {
            nodes: self.nodes.len(),
            leaves: self.leaves().count(),
            empty_leaves: self
                .nodes
                .iter()
                .filter(|n| n.is_leaf() && n.unsplit_polygons.is_empty())
                .count(),
            max_depth: self.root().map_or(0, |_| self.depth_below(NodeId(0))),
            bsp_trees: bsp.len(),
            bsp_nodes: tally(|s| s.nodes),
            bsp_leaves: tally(|s| s.leaves),
            bsp_max_depth: tally(|s| s.max_depth),
            bsp_polygons: tally(|s| s.polygons),
            pvs_entries: self.nodes.iter().map(|n| n.pvs.len()).sum(),
            pending_stubs: self.pending_count(),
        };
        info!("octree statistics:\n{}", stats);
        stats
    }

    fn depth_below(&self, id: NodeId) -> usize {
        1 + self.nodes[id.0]
            .children
            .map_or(0, |children| children.iter().map(|&c| self.depth_below(c)).max().unwrap_or(0))
    }
}
