// src/bsp/mod.rs
pub mod bsp_node;
pub mod bsp_tree;

pub use bsp_node::{BspNode, BspNodeId};
pub use bsp_tree::{BspStatistics, BspTree};

use serde::{Deserialize, Serialize};

/// Splitter heuristic for the embedded BSP trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BspMode {
    /// Fewest polygon splits, balance breaks ties.
    MinimizeSplits,
    /// Most even front/back distribution, splits break ties.
    MostBalanced,
    /// Weighted sum of imbalance and splits.
    #[default]
    BalanceAndSplits,
}

/// Cost of one split relative to one polygon of imbalance.
pub const SPLIT_WEIGHT: usize = 3;

impl BspMode {
    /// Score of a splitter, lower is better.
    pub fn score(self, front: usize, back: usize, splits: usize) -> (usize, usize) {
        let imbalance = front.abs_diff(back);
        match self {
            BspMode::MinimizeSplits => (splits, imbalance),
            BspMode::MostBalanced => (imbalance, splits),
            BspMode::BalanceAndSplits => (imbalance + SPLIT_WEIGHT * splits, splits),
        }
    }
}
