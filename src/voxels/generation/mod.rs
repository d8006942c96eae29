//! # World Generation Module
//!
//! Deterministic procedural terrain. [`WorldGenerator::generate`] is a pure
//! function of the world seed, the generation parameters and a chunk
//! coordinate: the same inputs always produce byte-identical chunks.
//!
//! ## Pipeline
//!
//! For every column of a chunk:
//! 1. A layered Fbm height field gives the surface height at the column's world XZ
//! 2. A low-frequency biome field picks the surface family (grass or sand)
//! 3. The column is filled bottom-up: bedrock at the world floor, stone, a few
//!    layers of filler, then the top block. Below the floor is void.
//! 4. An optional cave pass hollows out solid cells where a 3D noise field
//!    exceeds a threshold, never within a margin above bedrock.
//!
//! All noise is sampled in world coordinates and no step reads neighbouring
//! chunks, so chunks can be generated in any order, on any thread, and still
//! meet seamlessly.

use cgmath::{EuclideanSpace, Point3};
use serde::{Deserialize, Serialize};

use super::{
    block::{BlockId, BlockInstance, BlockRegistry, RegistryError},
    chunk::{Chunk, ChunkBuilder, ChunkCoordinate, ChunkDimension, ChunkError},
};

mod caves;
pub mod height_generator;

use caves::CaveCarver;
pub use height_generator::{Biome, Column, HeightGenerator};

/// The integer that parameterizes all terrain of a world.
pub type WorldSeed = u64;

/// Block ids used when filling columns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfacePalette {
    pub grass: BlockId,
    pub dirt: BlockId,
    pub stone: BlockId,
    pub bedrock: BlockId,
    pub sand: BlockId,
}

impl Default for SurfacePalette {
    fn default() -> Self {
        SurfacePalette {
            grass: BlockId::GRASS,
            dirt: BlockId::DIRT,
            stone: BlockId::STONE,
            bedrock: BlockId::BEDROCK,
            sand: BlockId::SAND,
        }
    }
}

impl SurfacePalette {
    fn ids(&self) -> [BlockId; 5] {
        [self.grass, self.dirt, self.stone, self.bedrock, self.sand]
    }
}

/// Tunable terrain parameters. Every field has a default, so a JSON document
/// only needs to name the values it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    /// Frequency of the first height octave, in cycles per block.
    pub terrain_frequency: f64,
    pub octaves: usize,
    /// Amplitude falloff between octaves.
    pub persistence: f64,
    /// Frequency growth between octaves.
    pub lacunarity: f64,
    /// Surface height where the height noise is at its minimum.
    pub base_height: i32,
    /// Range of surface heights above `base_height`.
    pub height_amplitude: i32,
    /// World Y of the bedrock layer. Everything below is void.
    pub world_floor: i32,
    /// Number of filler layers under the top block.
    pub dirt_depth: i32,
    pub biome_frequency: f64,
    /// Biome noise above this value turns a column sandy.
    pub sand_threshold: f64,
    pub caves_enabled: bool,
    pub cave_frequency: f64,
    /// Cave noise above this value carves a cell.
    pub cave_threshold: f64,
    /// Cells less than this many blocks above the world floor are never carved.
    pub cave_floor_margin: i32,
    pub palette: SurfacePalette,
}

impl Default for GenerationParams {
    fn default() -> Self {
        GenerationParams {
            terrain_frequency: 0.01,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            base_height: 32,
            height_amplitude: 24,
            world_floor: 0,
            dirt_depth: 3,
            biome_frequency: 0.005,
            sand_threshold: 0.35,
            caves_enabled: true,
            cave_frequency: 0.06,
            cave_threshold: 0.55,
            cave_floor_margin: 4,
            palette: SurfacePalette::default(),
        }
    }
}

/// Derives an independent 32-bit noise seed from the world seed.
pub(crate) fn derive_seed(seed: WorldSeed, salt: u32) -> u32 {
    let mut z = seed ^ (salt as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    (z ^ (z >> 31)) as u32
}

/// Passes finite noise samples through. A non-finite sample is a generator
/// defect: it asserts in debug builds and falls back to `fallback` otherwise.
pub(crate) fn finite_or_default(sample: f64, fallback: f64, field: &str) -> f64 {
    debug_assert!(sample.is_finite(), "{field} noise produced {sample}");
    if sample.is_finite() {
        sample
    } else {
        log::error!("{field} noise produced {sample}, using {fallback}");
        fallback
    }
}

/// Generates chunk contents from a world seed.
///
/// The generator is immutable after construction and shared between worker
/// threads behind an `Arc`.
pub struct WorldGenerator {
    seed: WorldSeed,
    dimension: ChunkDimension,
    params: GenerationParams,
    heights: HeightGenerator,
    caves: CaveCarver,
}

impl WorldGenerator {
    /// Creates a generator for a world.
    ///
    /// # Arguments
    /// * `seed` - The world seed
    /// * `dimension` - Edge length of generated chunks
    /// * `params` - Terrain parameters
    /// * `registry` - Catalog the palette ids are checked against
    ///
    /// # Errors
    /// [`RegistryError::UnknownBlock`] if the palette names a block the
    /// registry does not know.
    pub fn new(
        seed: WorldSeed,
        dimension: ChunkDimension,
        params: GenerationParams,
        registry: &BlockRegistry,
    ) -> Result<Self, RegistryError> {
        for id in params.palette.ids() {
            registry.lookup(id)?;
        }

        Ok(WorldGenerator {
            seed,
            dimension,
            heights: HeightGenerator::new(seed, &params),
            caves: CaveCarver::new(seed, &params),
            params,
        })
    }

    pub fn seed(&self) -> WorldSeed {
        self.seed
    }

    pub fn dimension(&self) -> ChunkDimension {
        self.dimension
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    /// Surface height of the column at world `(x, z)`.
    pub fn surface_height(&self, world_x: i32, world_z: i32) -> i32 {
        self.heights.surface_height(world_x, world_z)
    }

    /// Declared bound on the surface height difference between two
    /// horizontally adjacent columns, anywhere in the world.
    pub fn max_slope(&self) -> i32 {
        self.heights.max_slope()
    }

    /// Surface heights of every column of a chunk, indexed `x + z * Dim`.
    pub fn column_heights(&self, coordinate: ChunkCoordinate) -> Vec<i32> {
        self.columns(coordinate.origin(self.dimension))
            .into_iter()
            .map(|column| column.surface)
            .collect()
    }

    /// The block the generator places at a world position.
    pub fn block_at(&self, world: Point3<i32>) -> BlockId {
        let column = self.heights.column(world.x, world.z);
        self.block_for(world, column)
    }

    /// Generates the chunk at `coordinate`.
    ///
    /// The result is flagged as generated and is clean: nothing about it needs
    /// saving until it is first written to.
    ///
    /// # Panics
    /// If the builder rejects the generated cells, which indicates a defect in
    /// the generator itself.
    pub fn generate(&self, coordinate: ChunkCoordinate) -> Chunk {
        let mut chunk = self
            .fill(coordinate)
            .unwrap_or_else(|err| {
                panic!("generator produced a malformed chunk at {coordinate}: {err}")
            });
        chunk.set_generated(true);
        log::trace!("Generated chunk {coordinate} ({} solid cells)", chunk.non_empty_count());
        chunk
    }

    fn fill(&self, coordinate: ChunkCoordinate) -> Result<Chunk, ChunkError> {
        let origin = coordinate.origin(self.dimension);
        let edge = self.dimension.edge();
        let mut builder = ChunkBuilder::new(coordinate, self.dimension);

        let top = origin.y + edge - 1;
        if top < self.params.world_floor || origin.y > self.heights.max_surface() {
            builder.push_run(BlockInstance::AIR, self.dimension.volume())?;
            return builder.return_chunk();
        }

        let columns = self.columns(origin);
        while let Some(local) = builder.next_position() {
            let column = columns[(local.x + local.z * edge) as usize];
            let world = origin + local.to_vec();
            builder.push_block(BlockInstance::new(self.block_for(world, column)))?;
        }
        builder.return_chunk()
    }

    /// Column data for every XZ position of the chunk whose origin is given.
    fn columns(&self, origin: Point3<i32>) -> Vec<Column> {
        let edge = self.dimension.edge();
        let mut columns = Vec::with_capacity(self.dimension.plane_size());
        for z in 0..edge {
            for x in 0..edge {
                columns.push(self.heights.column(origin.x + x, origin.z + z));
            }
        }
        columns
    }

    fn block_for(&self, world: Point3<i32>, column: Column) -> BlockId {
        let params = &self.params;
        let palette = &params.palette;

        if world.y < params.world_floor || world.y > column.surface {
            return BlockId::AIR;
        }
        if world.y == params.world_floor {
            return palette.bedrock;
        }
        if params.caves_enabled && self.caves.is_carved(world) {
            return BlockId::AIR;
        }

        let (top, filler) = match column.biome {
            Biome::Temperate => (palette.grass, palette.dirt),
            Biome::Sandy => (palette.sand, palette.sand),
        };
        if world.y == column.surface {
            top
        } else if world.y >= column.surface - params.dirt_depth {
            filler
        } else {
            palette.stone
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(seed: WorldSeed, params: GenerationParams) -> WorldGenerator {
        let registry = BlockRegistry::with_defaults().unwrap();
        WorldGenerator::new(seed, ChunkDimension::new(16).unwrap(), params, &registry).unwrap()
    }

    fn no_caves() -> GenerationParams {
        GenerationParams {
            caves_enabled: false,
            ..GenerationParams::default()
        }
    }

    #[test]
    fn same_seed_same_bytes() {
        let a = generator(42, GenerationParams::default());
        let b = generator(42, GenerationParams::default());
        for coordinate in [
            ChunkCoordinate::new(0, 0, 0),
            ChunkCoordinate::new(-3, 1, 7),
            ChunkCoordinate::new(12, 2, -5),
        ] {
            assert_eq!(a.generate(coordinate).as_bytes(), b.generate(coordinate).as_bytes());
        }
    }

    #[test]
    fn different_seeds_differ() {
        let a = generator(1, no_caves());
        let b = generator(2, no_caves());
        let coordinate = ChunkCoordinate::new(0, 1, 0);
        assert_ne!(a.column_heights(coordinate), b.column_heights(coordinate));
    }

    #[test]
    fn generated_chunks_are_clean_and_flagged() {
        let chunk =
            generator(7, GenerationParams::default()).generate(ChunkCoordinate::new(0, 0, 0));
        assert!(chunk.is_generated());
        assert!(!chunk.is_dirty());
    }

    #[test]
    fn columns_follow_the_layer_rule() {
        let params = GenerationParams {
            sand_threshold: f64::INFINITY,
            ..no_caves()
        };
        let generator = generator(99, params.clone());
        for (x, z) in [(0, 0), (5, -3), (-40, 17)] {
            let surface = generator.surface_height(x, z);
            assert!(surface > params.world_floor);
            assert_eq!(generator.block_at(Point3::new(x, params.world_floor - 1, z)), BlockId::AIR);
            assert_eq!(generator.block_at(Point3::new(x, params.world_floor, z)), BlockId::BEDROCK);
            assert_eq!(generator.block_at(Point3::new(x, surface, z)), BlockId::GRASS);
            assert_eq!(generator.block_at(Point3::new(x, surface + 1, z)), BlockId::AIR);
            assert_eq!(generator.block_at(Point3::new(x, surface - 1, z)), BlockId::DIRT);
            let deep = surface - params.dirt_depth - 1;
            if deep > params.world_floor {
                assert_eq!(generator.block_at(Point3::new(x, deep, z)), BlockId::STONE);
            }
        }
    }

    #[test]
    fn surface_heights_stay_in_range() {
        let params = GenerationParams::default();
        let generator = generator(5, params.clone());
        for x in -64..64 {
            let height = generator.surface_height(x * 7, x * 3);
            assert!(height >= params.base_height);
            assert!(height <= params.base_height + params.height_amplitude);
        }
    }

    #[test]
    fn caves_never_breach_the_floor_margin() {
        let params = GenerationParams {
            cave_threshold: -1.0,
            ..GenerationParams::default()
        };
        let generator = generator(3, params.clone());
        let chunk = generator.generate(ChunkCoordinate::new(0, 0, 0));
        for x in 0..16 {
            for z in 0..16 {
                for y in params.world_floor..params.world_floor + params.cave_floor_margin {
                    assert!(!chunk.get_block(Point3::new(x, y, z)).unwrap().is_air());
                }
                let carved = Point3::new(x, params.world_floor + params.cave_floor_margin, z);
                assert!(chunk.get_block(carved).unwrap().is_air());
            }
        }
    }

    #[test]
    fn chunks_far_above_or_below_are_void() {
        let generator = generator(11, GenerationParams::default());
        assert!(generator.generate(ChunkCoordinate::new(0, 10, 0)).is_empty());
        assert!(generator.generate(ChunkCoordinate::new(0, -2, 0)).is_empty());
    }

    #[test]
    fn unknown_palette_blocks_are_rejected() {
        let registry = BlockRegistry::new();
        let result = WorldGenerator::new(
            1,
            ChunkDimension::default(),
            GenerationParams::default(),
            &registry,
        );
        assert!(matches!(result, Err(RegistryError::UnknownBlock(_))));
    }

    #[test]
    fn derived_seeds_are_stable_and_salted() {
        assert_eq!(derive_seed(42, 1), derive_seed(42, 1));
        assert_ne!(derive_seed(42, 1), derive_seed(42, 2));
        assert_ne!(derive_seed(42, 1), derive_seed(43, 1));
    }
}
