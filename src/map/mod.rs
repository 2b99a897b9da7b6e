// src/map/mod.rs
pub mod procedural;
pub mod sector;

pub use procedural::{GenerationStats, GeneratorConfig, ProceduralGenerator};
pub use sector::{Opening, PolygonId, Sector, SectorPolygon};
