use std::{io, path::PathBuf};

use thiserror::Error;

use crate::voxels::{
    block::BlockId,
    chunk::{ChunkCoordinate, ChunkError},
    generation::WorldSeed,
};

/// Errors raised while reading or writing saved world data.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("no saved data for chunk {0}")]
    NotFound(ChunkCoordinate),
    #[error("corrupt data in {}: {kind}", .path.display())]
    CorruptData {
        path: PathBuf,
        #[source]
        kind: CorruptionKind,
    },
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),
}

impl PersistenceError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, kind: CorruptionKind) -> Self {
        PersistenceError::CorruptData {
            path: path.into(),
            kind,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PersistenceError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Why a stored document was rejected.
#[derive(Debug, Error)]
pub enum CorruptionKind {
    #[error("malformed document: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unsupported schema version {0}")]
    UnsupportedVersion(u32),
    #[error("document is for chunk {found}, expected {expected}")]
    CoordinateMismatch {
        expected: ChunkCoordinate,
        found: ChunkCoordinate,
    },
    #[error("document was written for seed {found}, world seed is {expected}")]
    SeedMismatch { expected: WorldSeed, found: WorldSeed },
    #[error("document has chunk dimension {found}, expected {expected}")]
    DimensionMismatch { expected: u32, found: u32 },
    #[error("payload decodes to {found} cells, expected {expected}")]
    CellCount { expected: usize, found: u64 },
    #[error("cell {index} holds unregistered block {id}")]
    UnknownBlock { index: usize, id: BlockId },
    #[error("cell {index} holds block id {raw}, which is not a valid id")]
    BlockIdOutOfRange { index: usize, raw: u32 },
    #[error("cell {index} carries metadata but block {id} does not support it")]
    MetadataNotSupported { index: usize, id: BlockId },
    #[error("metadata entry for cell {index} is out of range")]
    MetadataOutOfRange { index: u32 },
    #[error(transparent)]
    Chunk(#[from] ChunkError),
}
