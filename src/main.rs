//! # sector_pvs Main Entry Point
//!
//! Generates procedural sectors, builds an octree and a potentially visible
//! set for each of them, then marks visibility from every room center and
//! reports the tree statistics. Sectors are independent, so each one is
//! processed on its own rayon task.
//!
//! ```text
//! sector_pvs [--sectors N] [--seed S] [--config path.json] [--json]
//! ```

use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Parser;
use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use sector_pvs::map::{GenerationStats, GeneratorConfig, ProceduralGenerator};
use sector_pvs::{Octree, OctreeConfig, OctreeStatistics, PvsError, Result};

/// Contents of the `--config` file. Both sections are optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RunConfig {
    octree: OctreeConfig,
    generator: GeneratorConfig,
}

/// Build octrees and potentially visible sets for procedural sectors.
#[derive(Parser, Debug)]
#[command(name = "sector_pvs")]
#[command(about = "Builds octrees and PVS data for generated sectors and reports their statistics")]
struct Args {
    /// Number of sectors to generate.
    #[arg(short, long, default_value_t = 1)]
    sectors: usize,

    /// Seed of the first sector; sector `i` uses `seed + i`.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// JSON file with optional `octree` and `generator` sections.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the reports as JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct SectorReport {
    name: String,
    seed: u64,
    generation: GenerationStats,
    statistics: OctreeStatistics,
    /// Number of polygons marked visible from each room center.
    visible_from_rooms: Vec<usize>,
}

fn process_sector(index: usize, seed: u64, run: &RunConfig) -> Result<SectorReport> {
    let name = format!("sector_{index}");
    let mut generator = ProceduralGenerator::new(GeneratorConfig {
        seed,
        ..run.generator.clone()
    })?;
    let sector = generator.generate(&name)?;

    let bbox = sector
        .bounding_box()
        .ok_or_else(|| PvsError::Generator(format!("{name} has no polygons")))?
        .expanded(1.0);
    let mut tree = Octree::new(bbox, run.octree.clone())?;
    tree.build(&sector)?;
    tree.build_pvs(&sector)?;

    let visible_from_rooms = generator
        .rooms()
        .iter()
        .map(|room| -> Result<usize> {
            tree.mark_visible_from_pvs(room.center())?;
            Ok(tree.visible_polygons().len())
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SectorReport {
        seed,
        generation: generator.stats().cloned().unwrap_or_default(),
        statistics: tree.statistics(),
        visible_from_rooms,
        name,
    })
}

fn main() -> std::result::Result<(), Box<dyn Error>> {
    // Initialize logging.
    env_logger::init();

    let args = Args::parse();
    let run = match &args.config {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => RunConfig::default(),
    };
    info!("processing {} sectors from seed {}", args.sectors, args.seed);

    let reports = (0..args.sectors)
        .into_par_iter()
        .map(|i| process_sector(i, args.seed + i as u64, &run))
        .collect::<Result<Vec<_>>>()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            let g = &report.generation;
            println!(
                "{} (seed {}): {} rooms, {} doors ({} portals), {} polygons",
                report.name, report.seed, g.room_count, g.door_count, g.portal_count, g.polygon_count
            );
            println!("{}", report.statistics);
            println!("  visible polygons per room: {:?}", report.visible_from_rooms);
        }
    }
    info!("done");
    Ok(())
}
