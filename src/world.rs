//! # World Context
//!
//! `VoxelWorld` is the explicit handle that ties one world's services
//! together: configuration, block registry, generator, persistence and the
//! chunk manager. There is no process-wide world state; everything reaches
//! the core through this handle.

use std::sync::Arc;

use cgmath::{Point3, Vector3};
use log::info;
use thiserror::Error;

use crate::{
    config::{ConfigError, WorldConfig},
    voxels::{
        block::{BlockInstance, BlockRegistry, RegistryError},
        chunk::{ChunkCoordinate, ChunkDimension},
        generation::{WorldGenerator, WorldSeed},
        manager::{ChunkManager, ManagerError, RegionUpdate, ShutdownReport},
        persistence::{ChunkPersistence, PersistenceError, WorldMeta},
    },
};

#[derive(Debug, Error)]
pub enum WorldError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Manager(#[from] ManagerError),
    #[error(
        "world '{world_name}' was created with seed {stored}, configuration asks for {configured}"
    )]
    SeedMismatch {
        world_name: String,
        stored: WorldSeed,
        configured: WorldSeed,
    },
    #[error(
        "world '{world_name}' uses chunk dimension {}, configuration asks for {}",
        .stored.get(),
        .configured.get()
    )]
    DimensionMismatch {
        world_name: String,
        stored: ChunkDimension,
        configured: ChunkDimension,
    },
}

/// An open world.
pub struct VoxelWorld {
    config: WorldConfig,
    registry: Arc<BlockRegistry>,
    generator: Arc<WorldGenerator>,
    persistence: Arc<ChunkPersistence>,
    manager: ChunkManager,
    meta: WorldMeta,
}

impl VoxelWorld {
    /// Opens the world named in `config`, creating it if it has never been
    /// saved. The block catalog comes from `config.block_catalog` when set and
    /// from the built-in defaults otherwise.
    ///
    /// # Errors
    /// - [`WorldError::Config`] if the configuration is invalid
    /// - [`WorldError::Registry`] if the catalog cannot be loaded or lacks a
    ///   block the generator needs
    /// - [`WorldError::SeedMismatch`] / [`WorldError::DimensionMismatch`] if an
    ///   existing world was created with different settings
    /// - [`WorldError::Persistence`] if the world metadata cannot be read or written
    pub fn open(config: WorldConfig) -> Result<Self, WorldError> {
        let registry = match &config.block_catalog {
            Some(path) => BlockRegistry::load_from_file(path)?,
            None => BlockRegistry::with_defaults()?,
        };
        Self::open_with_registry(config, registry)
    }

    /// Like [`VoxelWorld::open`] with a caller-supplied block catalog.
    pub fn open_with_registry(
        config: WorldConfig,
        registry: BlockRegistry,
    ) -> Result<Self, WorldError> {
        config.validate()?;
        let registry = Arc::new(registry);
        let generator = Arc::new(WorldGenerator::new(
            config.seed,
            config.chunk_dimension,
            config.generation.clone(),
            &registry,
        )?);
        let persistence = Arc::new(ChunkPersistence::new(
            config.save_layout(),
            registry.clone(),
            config.seed,
            config.chunk_dimension,
        ));

        let meta = if persistence.world_exists() {
            let meta = persistence.load_meta()?;
            check_compatible(&config, &meta)?;
            info!(
                "Opened world '{}' (seed {}, {} saved chunks)",
                config.world_name,
                meta.seed,
                meta.chunks.len()
            );
            meta
        } else {
            let mut meta = WorldMeta::new(&config.world_name, config.seed, config.chunk_dimension);
            meta.touch_saved_time();
            persistence.save_meta(&meta)?;
            info!(
                "Created world '{}' at {}",
                config.world_name,
                persistence.layout().world_dir().display()
            );
            meta
        };

        let manager = ChunkManager::new(
            registry.clone(),
            generator.clone(),
            persistence.clone(),
            config.manager_settings(),
        );

        Ok(VoxelWorld {
            config,
            registry,
            generator,
            persistence,
            manager,
            meta,
        })
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    pub fn generator(&self) -> &WorldGenerator {
        &self.generator
    }

    pub fn persistence(&self) -> &ChunkPersistence {
        &self.persistence
    }

    pub fn meta(&self) -> &WorldMeta {
        &self.meta
    }

    pub fn manager(&self) -> &ChunkManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut ChunkManager {
        &mut self.manager
    }

    /// Records the player pose and centres the active region on it.
    pub fn update_player(
        &mut self,
        location: Point3<f32>,
        rotation: Vector3<f32>,
    ) -> Result<RegionUpdate, WorldError> {
        self.meta.player_location = location;
        self.meta.player_rotation = rotation;
        let block = Point3::new(
            location.x.floor() as i32,
            location.y.floor() as i32,
            location.z.floor() as i32,
        );
        let center = ChunkCoordinate::containing(block, self.config.chunk_dimension);
        Ok(self
            .manager
            .update_active_region(center, self.config.active_radius)?)
    }

    /// Reads a block; see [`ChunkManager::get_block`].
    pub fn get_block(&mut self, world: Point3<i32>) -> Result<BlockInstance, WorldError> {
        Ok(self.manager.get_block(world)?)
    }

    /// Writes a block; see [`ChunkManager::set_block`].
    pub fn set_block(
        &mut self,
        world: Point3<i32>,
        block: BlockInstance,
    ) -> Result<BlockInstance, WorldError> {
        Ok(self.manager.set_block(world, block)?)
    }

    /// Writes `world_meta.json` with the current player pose and the list of
    /// saved chunks.
    pub fn save_meta(&mut self) -> Result<(), WorldError> {
        self.meta.chunks = self.persistence.saved_chunks()?;
        self.meta.touch_saved_time();
        self.persistence.save_meta(&self.meta)?;
        Ok(())
    }

    /// Shuts the manager down, persisting all dirty chunks, then saves the
    /// world metadata.
    pub fn shutdown(mut self) -> Result<ShutdownReport, WorldError> {
        let report = self.manager.shutdown();
        self.save_meta()?;
        Ok(report)
    }
}

fn check_compatible(config: &WorldConfig, meta: &WorldMeta) -> Result<(), WorldError> {
    if meta.seed != config.seed {
        return Err(WorldError::SeedMismatch {
            world_name: config.world_name.clone(),
            stored: meta.seed,
            configured: config.seed,
        });
    }
    if meta.chunk_dimension != config.chunk_dimension {
        return Err(WorldError::DimensionMismatch {
            world_name: config.world_name.clone(),
            stored: meta.chunk_dimension,
            configured: config.chunk_dimension,
        });
    }
    Ok(())
}
