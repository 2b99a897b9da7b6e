// src/map/procedural.rs

use std::collections::HashMap;

use glam::{Vec2, Vec3};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{PvsError, Result};
use crate::geometry::{Axis, Box3, Polygon3, Side};
use crate::map::{Opening, Sector};

/// Builds sectors out of a grid of box rooms joined by doorways.
pub struct ProceduralGenerator {
    config: GeneratorConfig,
    rng: StdRng,
    rooms: Vec<Box3>,
    doors: Vec<Door>,
    stats: Option<GenerationStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub rooms_x: usize,
    pub rooms_y: usize,
    pub rooms_z: usize,
    pub room_size: f32,
    pub min_door_size: f32,
    pub max_door_size: f32,
    /// Chance of a doorway between two neighbouring rooms beyond the ones
    /// needed to connect every room.
    pub branching_factor: f64,
    /// Chance that a doorway is closed by a see-through portal polygon.
    pub portal_probability: f64,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            rooms_x: 4,
            rooms_y: 1,
            rooms_z: 4,
            room_size: 16.0,
            min_door_size: 2.0,
            max_door_size: 5.0,
            branching_factor: 0.2,
            portal_probability: 0.25,
            seed: 0,
        }
    }
}

#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct GenerationStats {
    pub room_count: usize,
    pub door_count: usize,
    pub portal_count: usize,
    pub polygon_count: usize,
}

#[derive(Debug, Clone, Copy)]
struct Door {
    from: usize,
    to: usize,
    axis: Axis,
    opening: Opening,
    portal: bool,
}

impl GeneratorConfig {
    fn validate(&self) -> Result<()> {
        if self.rooms_x == 0 || self.rooms_y == 0 || self.rooms_z == 0 {
            return Err(PvsError::Generator("room grid must not be empty".into()));
        }
        if !(self.room_size > 0.0) {
            return Err(PvsError::Generator(format!("invalid room size {}", self.room_size)));
        }
        if !(self.min_door_size > 0.0 && self.min_door_size <= self.max_door_size)
            || self.max_door_size >= self.room_size * 0.8
        {
            return Err(PvsError::Generator(format!(
                "door size range {}..{} does not fit rooms of size {}",
                self.min_door_size, self.max_door_size, self.room_size
            )));
        }
        for (name, p) in [
            ("branching_factor", self.branching_factor),
            ("portal_probability", self.portal_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(PvsError::Generator(format!("{name} must be within 0..1, got {p}")));
            }
        }
        Ok(())
    }
}

impl ProceduralGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        config.validate()?;
        Ok(ProceduralGenerator {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            rooms: Vec::new(),
            doors: Vec::new(),
            stats: None,
        })
    }

    pub fn generate(&mut self, name: &str) -> Result<Sector> {
        self.rooms = self.generate_rooms();
        self.doors = self.generate_doors();

        let mut sector = Sector::new(name);
        self.build_sector(&mut sector)?;

        let stats = GenerationStats {
            room_count: self.rooms.len(),
            door_count: self.doors.len(),
            portal_count: self.doors.iter().filter(|d| d.portal).count(),
            polygon_count: sector.polygon_count(),
        };
        info!(
            "generated sector '{}': {} rooms, {} doors, {} polygons",
            name, stats.room_count, stats.door_count, stats.polygon_count
        );
        self.stats = Some(stats);
        Ok(sector)
    }

    pub fn rooms(&self) -> &[Box3] {
        &self.rooms
    }

    pub fn stats(&self) -> Option<&GenerationStats> {
        self.stats.as_ref()
    }

    fn dims(&self) -> [usize; 3] {
        [self.config.rooms_x, self.config.rooms_y, self.config.rooms_z]
    }

    fn room_index(&self, cell: [usize; 3]) -> usize {
        let [nx, ny, _] = self.dims();
        cell[0] + nx * (cell[1] + ny * cell[2])
    }

    fn room_cell(&self, index: usize) -> [usize; 3] {
        let [nx, ny, _] = self.dims();
        [index % nx, (index / nx) % ny, index / (nx * ny)]
    }

    fn generate_rooms(&self) -> Vec<Box3> {
        let [nx, ny, nz] = self.dims();
        let size = self.config.room_size;
        (0..nx * ny * nz)
            .map(|i| {
                let cell = self.room_cell(i);
                let min = Vec3::new(cell[0] as f32, cell[1] as f32, cell[2] as f32) * size;
                Box3::new(min, min + Vec3::splat(size))
            })
            .collect()
    }

    /// Neighbour of `room` one step towards positive `axis`, if inside the grid.
    fn neighbour(&self, room: usize, axis: Axis, positive: bool) -> Option<usize> {
        let mut cell = self.room_cell(room);
        let i = axis.index();
        if positive {
            cell[i] += 1;
            (cell[i] < self.dims()[i]).then(|| self.room_index(cell))
        } else {
            cell[i] = cell[i].checked_sub(1)?;
            Some(self.room_index(cell))
        }
    }

    /// A random spanning tree over the room grid, plus extra doorways.
    fn generate_doors(&mut self) -> Vec<Door> {
        let count = self.rooms.len();
        let mut visited = vec![false; count];
        let mut connected: HashMap<(usize, usize), Axis> = HashMap::new();
        let mut stack = vec![0usize];
        visited[0] = true;

        while let Some(&room) = stack.last() {
            let mut options: Vec<(usize, Axis)> = Axis::ALL
                .into_iter()
                .flat_map(|axis| [(axis, false), (axis, true)])
                .filter_map(|(axis, positive)| self.neighbour(room, axis, positive).map(|n| (n, axis)))
                .filter(|&(n, _)| !visited[n])
                .collect();
            if options.is_empty() {
                stack.pop();
                continue;
            }
            options.shuffle(&mut self.rng);
            let (next, axis) = options[0];
            visited[next] = true;
            connected.insert((room.min(next), room.max(next)), axis);
            stack.push(next);
        }

        for room in 0..count {
            for axis in Axis::ALL {
                if let Some(next) = self.neighbour(room, axis, true) {
                    if !connected.contains_key(&(room, next))
                        && self.rng.random_bool(self.config.branching_factor)
                    {
                        connected.insert((room, next), axis);
                    }
                }
            }
        }

        let mut pairs: Vec<_> = connected.into_iter().collect();
        pairs.sort_by_key(|&((a, b), _)| (a, b));
        pairs
            .into_iter()
            .map(|((from, to), axis)| {
                let opening = self.random_opening();
                let portal = self.rng.random_bool(self.config.portal_probability);
                Door {
                    from,
                    to,
                    axis,
                    opening: self.place_opening(from, axis, opening),
                    portal,
                }
            })
            .collect()
    }

    /// Opening size and offset within a wall, relative to the wall corner.
    fn random_opening(&mut self) -> Opening {
        let size = self.config.room_size;
        let w = self.rng.random_range(self.config.min_door_size..=self.config.max_door_size);
        let h = self.rng.random_range(self.config.min_door_size..=self.config.max_door_size);
        let margin = size * 0.1;
        let ou = self.rng.random_range(margin..=size - margin - w);
        let ov = self.rng.random_range(margin..=size - margin - h);
        Opening::new(Vec2::new(ou, ov), Vec2::new(ou + w, ov + h))
    }

    fn place_opening(&self, room: usize, axis: Axis, local: Opening) -> Opening {
        let (u, v) = axis.others();
        let origin = self.rooms[room].min;
        let offset = Vec2::new(origin[u.index()], origin[v.index()]);
        Opening::new(local.min + offset, local.max + offset)
    }

    fn build_sector(&self, sector: &mut Sector) -> Result<()> {
        for (index, room) in self.rooms.iter().enumerate() {
            let openings: Vec<(Side, Opening)> = self
                .doors
                .iter()
                .filter_map(|door| {
                    if door.from == index {
                        Some((Side::new(door.axis, true), door.opening))
                    } else if door.to == index {
                        Some((Side::new(door.axis, false), door.opening))
                    } else {
                        None
                    }
                })
                .collect();
            let ids = sector.add_room(room, &openings)?;
            debug!("room {} -> {} wall polygons", index, ids.len());
        }

        for door in self.doors.iter().filter(|d| d.portal) {
            let room = &self.rooms[door.from];
            let w = room.side_coordinate(Side::new(door.axis, true));
            let (u, v) = door.axis.others();
            let corner = |a: f32, b: f32| {
                let mut p = Vec3::ZERO;
                p[door.axis.index()] = w;
                p[u.index()] = a;
                p[v.index()] = b;
                p
            };
            let (min, max) = (door.opening.min, door.opening.max);
            sector.add_portal(Polygon3::new(vec![
                corner(min.x, min.y),
                corner(max.x, min.y),
                corner(max.x, max.y),
                corner(min.x, max.y),
            ]))?;
        }
        Ok(())
    }
}
