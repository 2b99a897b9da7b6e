// src/config.rs
//! Build parameters for the octree, its embedded BSPs and the PVS pass.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bsp::BspMode;
use crate::error::Result;

/// General geometric tolerance (plane classification, vertex de-duplication).
pub const EPSILON: f32 = 1e-4;
/// Tolerance for box adjacency and degenerate fragment detection.
pub const SMALL_EPSILON: f32 = 1e-3;
/// Prevent excessively deep embedded BSP trees.
pub const BSP_DEPTH_LIMIT: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OctreeConfig {
    /// Nodes with at most this many polygons become leaves holding a mini BSP.
    pub bsp_threshold: usize,
    /// Splitter heuristic used by the mini BSPs.
    pub bsp_mode: BspMode,
    /// Depth at which a node is forced to become a leaf.
    pub max_depth: usize,
    /// Consecutive splits allowed to hand one child every polygon of its
    /// parent. Polygons meeting along a shared edge never separate, so such
    /// chains end in a leaf instead of running down to `max_depth`.
    pub max_stalled_splits: usize,
    /// Half-size of the split candidate window, as a fraction of the node size.
    pub center_window: f32,
    /// Offset added to every split candidate so planes avoid vertex coordinates.
    pub split_offset: f32,
    /// Cells per axis on every coverage face.
    pub coverage_resolution: usize,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        OctreeConfig {
            bsp_threshold: 30,
            bsp_mode: BspMode::BalanceAndSplits,
            max_depth: 24,
            max_stalled_splits: 2,
            center_window: 0.2,
            split_offset: 0.1,
            coverage_resolution: 16,
        }
    }
}

impl OctreeConfig {
    pub fn with_bsp_threshold(mut self, bsp_threshold: usize) -> Self {
        self.bsp_threshold = bsp_threshold;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a config file; missing fields fall back to the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
