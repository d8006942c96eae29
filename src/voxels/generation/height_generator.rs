//! # Height Generator
//!
//! Maps world XZ columns to a surface height and a biome by sampling layered
//! coherent noise. Everything here is evaluated in world coordinates, so two
//! chunks generated independently agree on every column they could share.

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

use super::{derive_seed, finite_or_default, GenerationParams, WorldSeed};

/// Seed salt for the terrain height field.
const TERRAIN_SALT: u32 = 0x7e44_a1f3;
/// Seed salt for the biome field.
const BIOME_SALT: u32 = 0x51b0_3c9d;

/// Upper bound on the gradient magnitude of a single Perlin octave in noise
/// space. Used only to declare the slope bound, so it errs high.
const PERLIN_GRADIENT_BOUND: f64 = 4.0;

/// The surface family a column belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Biome {
    /// Grass on top of dirt.
    Temperate,
    /// Sand on top of sand.
    Sandy,
}

/// Per-column terrain data.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Column {
    /// World Y of the topmost solid block.
    pub surface: i32,
    pub biome: Biome,
}

/// Samples surface heights and biomes for world columns.
pub struct HeightGenerator {
    terrain: Fbm<Perlin>,
    biome: Perlin,
    params: GenerationParams,
}

impl HeightGenerator {
    /// Builds the noise stack for a seed.
    pub fn new(seed: WorldSeed, params: &GenerationParams) -> Self {
        let terrain = Fbm::<Perlin>::new(derive_seed(seed, TERRAIN_SALT))
            .set_octaves(params.octaves)
            .set_frequency(params.terrain_frequency)
            .set_persistence(params.persistence)
            .set_lacunarity(params.lacunarity);

        HeightGenerator {
            terrain,
            biome: Perlin::new(derive_seed(seed, BIOME_SALT)),
            params: params.clone(),
        }
    }

    /// Lowest surface height this generator can produce.
    pub fn min_surface(&self) -> i32 {
        self.params.world_floor + 1
    }

    /// Highest surface height this generator can produce.
    pub fn max_surface(&self) -> i32 {
        (self.params.base_height + self.params.height_amplitude).max(self.min_surface())
    }

    /// Surface height of the column at world `(x, z)`.
    ///
    /// Fbm noise in `[-1, 1]` is mapped to `[0, 1]` and scaled by the height
    /// amplitude on top of the base height, then clamped so the column always
    /// has at least one block above bedrock.
    pub fn surface_height(&self, world_x: i32, world_z: i32) -> i32 {
        let sample = self.terrain.get([world_x as f64, world_z as f64]);
        let sample = finite_or_default(sample, 0.0, "terrain height");
        let normalized = ((sample + 1.0) * 0.5).clamp(0.0, 1.0);
        let height =
            self.params.base_height as f64 + normalized * self.params.height_amplitude as f64;
        (height.round() as i32).clamp(self.min_surface(), self.max_surface())
    }

    /// Biome of the column at world `(x, z)`.
    pub fn biome_at(&self, world_x: i32, world_z: i32) -> Biome {
        let frequency = self.params.biome_frequency;
        let sample = self
            .biome
            .get([world_x as f64 * frequency, world_z as f64 * frequency]);
        let sample = finite_or_default(sample, f64::NEG_INFINITY, "biome");
        if sample > self.params.sand_threshold {
            Biome::Sandy
        } else {
            Biome::Temperate
        }
    }

    /// Surface height and biome of the column at world `(x, z)`.
    pub fn column(&self, world_x: i32, world_z: i32) -> Column {
        Column {
            surface: self.surface_height(world_x, world_z),
            biome: self.biome_at(world_x, world_z),
        }
    }

    /// Declared bound on how much the surface height can change between two
    /// horizontally adjacent columns.
    ///
    /// Derived from the amplitude of each octave after Fbm normalization times
    /// its frequency, plus one block for rounding.
    pub fn max_slope(&self) -> i32 {
        let p = self.params.persistence;
        let octaves = self.params.octaves.max(1);
        let total_weight: f64 = (1..=octaves).map(|i| p.powi(i as i32)).sum();
        let gradient: f64 = (0..octaves)
            .map(|i| {
                let weight = p.powi(i as i32 + 1) / total_weight;
                let frequency =
                    self.params.terrain_frequency * self.params.lacunarity.powi(i as i32);
                weight * frequency * PERLIN_GRADIENT_BOUND
            })
            .sum();
        let per_block = 0.5 * self.params.height_amplitude as f64 * gradient;
        per_block.ceil() as i32 + 1
    }
}
