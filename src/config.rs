//! # World Configuration
//!
//! Everything needed to create or open a world, supplied once and immutable
//! afterwards. Configurations are JSON documents in which every field is
//! optional:
//!
//! ```json
//! {
//!   "world_name": "alpha",
//!   "seed": 42,
//!   "chunk_dimension": 16,
//!   "active_radius": 4,
//!   "generation": { "caves_enabled": false }
//! }
//! ```

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::voxels::{
    chunk::ChunkDimension,
    generation::{GenerationParams, WorldSeed},
    manager::ManagerSettings,
    persistence::SaveLayout,
};

/// Smallest chunk edge length a world may be configured with.
pub const MIN_WORLD_CHUNK_DIMENSION: u32 = 4;
/// Largest active radius, in chunks.
pub const MAX_ACTIVE_RADIUS: u32 = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid configuration document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidParameter {
        name,
        reason: reason.into(),
    }
}

/// Settings a world is created with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Directory name of the world under `save_root`.
    pub world_name: String,
    pub seed: WorldSeed,
    pub chunk_dimension: ChunkDimension,
    /// Radius of the active region, in chunks.
    pub active_radius: u32,
    /// Extra ring of chunks kept resident before eviction.
    pub unload_margin: u32,
    /// Worker threads for loading, generating and saving. `0` runs inline.
    pub worker_count: usize,
    pub save_root: PathBuf,
    /// Bound on any blocking wait for a chunk task.
    pub task_timeout_ms: u64,
    /// Tasks running longer than this are logged.
    pub stuck_task_ms: u64,
    /// Optional JSON block catalog replacing the built-in one.
    pub block_catalog: Option<PathBuf>,
    pub generation: GenerationParams,
}

impl Default for WorldConfig {
    fn default() -> Self {
        WorldConfig {
            world_name: String::from("world"),
            seed: 0,
            chunk_dimension: ChunkDimension::default(),
            active_radius: 4,
            unload_margin: 0,
            worker_count: 4,
            save_root: PathBuf::from("saves"),
            task_timeout_ms: 5000,
            stuck_task_ms: 1000,
            block_catalog: None,
            generation: GenerationParams::default(),
        }
    }
}

impl WorldConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: WorldConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&text)?;
        log::info!("Loaded world configuration from {}", path.display());
        Ok(config)
    }

    /// Checks every field for a usable value.
    ///
    /// # Errors
    /// [`ConfigError::InvalidParameter`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.world_name.is_empty() {
            return Err(invalid("world_name", "must not be empty"));
        }
        if self.world_name == "."
            || self.world_name == ".."
            || !self
                .world_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' '))
        {
            return Err(invalid(
                "world_name",
                format!("{:?} is not a valid directory name", self.world_name),
            ));
        }
        if self.chunk_dimension.get() < MIN_WORLD_CHUNK_DIMENSION {
            return Err(invalid(
                "chunk_dimension",
                format!("must be at least {MIN_WORLD_CHUNK_DIMENSION}"),
            ));
        }
        if self.active_radius > MAX_ACTIVE_RADIUS {
            return Err(invalid("active_radius", format!("must be at most {MAX_ACTIVE_RADIUS}")));
        }
        if self.task_timeout_ms == 0 {
            return Err(invalid("task_timeout_ms", "must be positive"));
        }
        validate_generation(&self.generation)
    }

    /// Manager settings derived from this configuration.
    pub fn manager_settings(&self) -> ManagerSettings {
        ManagerSettings {
            worker_count: self.worker_count,
            unload_margin: self.unload_margin,
            max_radius: MAX_ACTIVE_RADIUS,
            task_timeout: Duration::from_millis(self.task_timeout_ms),
            stuck_task_threshold: Duration::from_millis(self.stuck_task_ms),
        }
    }

    /// Where this world's files live.
    pub fn save_layout(&self) -> SaveLayout {
        SaveLayout::new(&self.save_root, &self.world_name)
    }
}

fn validate_generation(params: &GenerationParams) -> Result<(), ConfigError> {
    let positive = |name: &'static str, value: f64| {
        if value.is_finite() && value > 0.0 {
            Ok(())
        } else {
            Err(invalid(name, format!("must be a positive number, got {value}")))
        }
    };
    positive("generation.terrain_frequency", params.terrain_frequency)?;
    positive("generation.biome_frequency", params.biome_frequency)?;
    positive("generation.cave_frequency", params.cave_frequency)?;

    if !(1..=16).contains(&params.octaves) {
        return Err(invalid("generation.octaves", "must be between 1 and 16"));
    }
    if !(params.persistence > 0.0 && params.persistence <= 1.0) {
        return Err(invalid("generation.persistence", "must be in (0, 1]"));
    }
    if !(params.lacunarity.is_finite() && params.lacunarity >= 1.0) {
        return Err(invalid("generation.lacunarity", "must be at least 1"));
    }
    if params.height_amplitude < 0 {
        return Err(invalid("generation.height_amplitude", "must not be negative"));
    }
    if params.dirt_depth < 0 {
        return Err(invalid("generation.dirt_depth", "must not be negative"));
    }
    if params.cave_floor_margin < 1 {
        return Err(invalid("generation.cave_floor_margin", "must be at least 1"));
    }
    if params.sand_threshold.is_nan() || params.cave_threshold.is_nan() {
        return Err(invalid("generation", "thresholds must be numbers"));
    }
    Ok(())
}
