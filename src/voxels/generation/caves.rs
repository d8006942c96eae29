//! Cave carving for generated terrain.

use cgmath::Point3;
use noise::{NoiseFn, Perlin};

use super::{derive_seed, finite_or_default, GenerationParams, WorldSeed};

/// Seed salt for the cave field.
const CAVE_SALT: u32 = 0x2c6e_f00d;

/// Decides which solid cells a cave passes through.
///
/// A cell is carved when a 3D Perlin field exceeds the cave threshold. Cells
/// closer than `cave_floor_margin` blocks to the world floor are never carved,
/// so caves cannot breach bedrock.
pub struct CaveCarver {
    field: Perlin,
    frequency: f64,
    threshold: f64,
    lowest_carvable: i32,
}

impl CaveCarver {
    pub fn new(seed: WorldSeed, params: &GenerationParams) -> Self {
        CaveCarver {
            field: Perlin::new(derive_seed(seed, CAVE_SALT)),
            frequency: params.cave_frequency,
            threshold: params.cave_threshold,
            lowest_carvable: params.world_floor + params.cave_floor_margin.max(1),
        }
    }

    /// Returns `true` if the cell at the given world position is hollowed out.
    pub fn is_carved(&self, world: Point3<i32>) -> bool {
        if world.y < self.lowest_carvable {
            return false;
        }
        let sample = self.field.get([
            world.x as f64 * self.frequency,
            world.y as f64 * self.frequency,
            world.z as f64 * self.frequency,
        ]);
        finite_or_default(sample, f64::NEG_INFINITY, "cave") > self.threshold
    }
}
