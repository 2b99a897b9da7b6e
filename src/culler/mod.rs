// src/culler/mod.rs
//! Face-coverage occlusion test between two boxes.
//!
//! Every face of the occludee box that a viewer box can look through gets a
//! coverage mask. Occluder polygons are projected onto those faces as the
//! region hidden from all eight viewer corners at once; the occludee is
//! hidden when every such face ends up fully covered.

pub mod coverage_cube;
pub mod shadow;

pub use coverage_cube::{CoverageCube, CoverageFace};
pub use shadow::umbra_projections;
