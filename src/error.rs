// src/error.rs

use glam::Vec3;
use thiserror::Error;

use crate::map::PolygonId;

/// Everything that can go wrong while building or querying a sector's
/// octree and PVS.
#[derive(Debug, Error)]
pub enum PvsError {
    #[error("octree bounding box is empty or inverted: min={min}, max={max}")]
    EmptyBox { min: Vec3, max: Vec3 },

    #[error("octree has already been built")]
    AlreadyBuilt,

    #[error("octree has not been built yet")]
    NotBuilt,

    #[error("PVS has not been built yet")]
    PvsNotBuilt,

    #[error("sector has {actual} polygons but the octree was built from {expected}")]
    SectorMismatch { expected: usize, actual: usize },

    #[error("unknown polygon {0}")]
    UnknownPolygon(PolygonId),

    #[error("polygon {id} is degenerate ({vertices} vertices)")]
    DegeneratePolygon { id: PolygonId, vertices: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("generator error: {0}")]
    Generator(String),
}

pub type Result<T> = std::result::Result<T, PvsError>;
