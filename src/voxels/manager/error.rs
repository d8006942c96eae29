use thiserror::Error;

use crate::voxels::{
    block::{BlockId, RegistryError},
    chunk::{ChunkCoordinate, ChunkError},
};

/// Errors surfaced by the chunk manager's public API.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("chunk {0} is unavailable: the chunk manager has shut down")]
    ChunkUnavailable(ChunkCoordinate),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("block {0} does not support metadata")]
    MetadataNotSupported(BlockId),
    #[error(transparent)]
    Chunk(#[from] ChunkError),
}
