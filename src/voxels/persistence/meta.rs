//! The `world_meta.json` document: seed, chunk size, player pose and the
//! list of saved chunks.

use cgmath::{EuclideanSpace, Point3, Vector3, Zero};
use serde::{Deserialize, Serialize};
use web_time::{SystemTime, UNIX_EPOCH};

use crate::voxels::{
    chunk::{ChunkCoordinate, ChunkDimension},
    generation::WorldSeed,
};

use super::error::CorruptionKind;

/// Schema version of `world_meta.json` written by this build.
pub const META_SCHEMA_VERSION: u32 = 1;

/// World-level save data, stored once per world next to the chunk files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldMeta {
    pub version: u32,
    pub world_name: String,
    pub seed: WorldSeed,
    pub chunk_dimension: ChunkDimension,
    #[serde(default = "origin")]
    pub player_location: Point3<f32>,
    /// Pitch, yaw and roll in degrees.
    #[serde(default = "no_rotation")]
    pub player_rotation: Vector3<f32>,
    /// Unix time in seconds of the last save.
    #[serde(default)]
    pub last_saved_unix: u64,
    /// Chunks that had been persisted at the last save.
    #[serde(default)]
    pub chunks: Vec<ChunkCoordinate>,
}

fn origin() -> Point3<f32> {
    Point3::origin()
}

fn no_rotation() -> Vector3<f32> {
    Vector3::zero()
}

impl WorldMeta {
    pub fn new(
        world_name: impl Into<String>,
        seed: WorldSeed,
        chunk_dimension: ChunkDimension,
    ) -> Self {
        WorldMeta {
            version: META_SCHEMA_VERSION,
            world_name: world_name.into(),
            seed,
            chunk_dimension,
            player_location: Point3::origin(),
            player_rotation: Vector3::zero(),
            last_saved_unix: 0,
            chunks: Vec::new(),
        }
    }

    /// Stamps the document with the current wall-clock time.
    pub fn touch_saved_time(&mut self) {
        self.last_saved_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0);
    }

    pub(super) fn parse(text: &str) -> Result<Self, CorruptionKind> {
        let meta: WorldMeta = serde_json::from_str(text)?;
        if meta.version > META_SCHEMA_VERSION || meta.version == 0 {
            return Err(CorruptionKind::UnsupportedVersion(meta.version));
        }
        Ok(meta)
    }
}
