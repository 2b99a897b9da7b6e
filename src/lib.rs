// src/lib.rs

pub mod bsp;
pub mod config;
pub mod culler;
pub mod error;
pub mod geometry;
pub mod map;
pub mod octree;
pub mod utils;

pub use config::OctreeConfig;
pub use error::{PvsError, Result};
pub use map::{PolygonId, Sector};
pub use octree::{NodeId, Octree, OctreeStatistics};
