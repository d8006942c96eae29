//! # Chunk Document Schema
//!
//! The on-disk form of a chunk is a JSON document:
//!
//! ```json
//! {
//!   "version": 2,
//!   "coordinate": { "x": 0, "y": 1, "z": -3 },
//!   "seed": 42,
//!   "dimension": 16,
//!   "generated": true,
//!   "blocks": { "encoding": "run_length", "data": [[3, 2048], [0, 2048]] },
//!   "metadata": [[517, 2]]
//! }
//! ```
//!
//! `blocks` is either `dense` (one block id per cell, row-major x, y, z) or
//! `run_length` (`[id, count]` pairs), whichever is smaller for the chunk.
//! `metadata` lists `[cell index, value]` for the few cells with non-zero
//! metadata.
//!
//! ## Versions
//! - 1: `blocks` is a bare dense id array, no metadata. Migrated on read.
//! - 2: current.
//!
//! Documents from a newer version are refused rather than guessed at.

use serde::{Deserialize, Serialize};

use crate::voxels::{
    block::{BlockId, BlockInstance, BlockRegistry},
    chunk::{ChunkCoordinate, ChunkDimension},
    generation::WorldSeed,
};

use super::error::CorruptionKind;

/// Schema version written by this build.
pub const CHUNK_SCHEMA_VERSION: u32 = 2;

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

/// Block payload of a chunk document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "encoding", content = "data", rename_all = "snake_case")]
pub enum BlockPayload {
    Dense(Vec<u16>),
    /// `[block id, run length]` pairs.
    RunLength(Vec<[u32; 2]>),
}

/// A chunk as stored on disk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDocument {
    pub version: u32,
    pub coordinate: ChunkCoordinate,
    /// Seed of the world the chunk was written for.
    pub seed: WorldSeed,
    pub dimension: u32,
    #[serde(default)]
    pub generated: bool,
    pub blocks: BlockPayload,
    /// `[cell index, metadata]` pairs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<[u32; 2]>,
}

#[derive(Deserialize)]
struct ChunkDocumentV1 {
    coordinate: ChunkCoordinate,
    seed: WorldSeed,
    dimension: u32,
    blocks: Vec<u16>,
}

impl From<ChunkDocumentV1> for ChunkDocument {
    fn from(old: ChunkDocumentV1) -> Self {
        ChunkDocument {
            version: CHUNK_SCHEMA_VERSION,
            coordinate: old.coordinate,
            seed: old.seed,
            dimension: old.dimension,
            generated: false,
            blocks: BlockPayload::Dense(old.blocks),
            metadata: Vec::new(),
        }
    }
}

impl ChunkDocument {
    /// Builds the document for a chunk's cells, choosing the smaller payload.
    pub fn encode(
        coordinate: ChunkCoordinate,
        seed: WorldSeed,
        dimension: ChunkDimension,
        cells: &[BlockInstance],
        generated: bool,
    ) -> Self {
        let mut runs: Vec<[u32; 2]> = Vec::new();
        let mut metadata = Vec::new();
        for (index, cell) in cells.iter().enumerate() {
            if cell.metadata != 0 {
                metadata.push([index as u32, cell.metadata as u32]);
            }
            let id = cell.id.0 as u32;
            if let Some([last, count]) = runs.last_mut() {
                if *last == id {
                    *count += 1;
                    continue;
                }
            }
            runs.push([id, 1]);
        }

        // A run costs two numbers, a dense cell one.
        let blocks = if runs.len() * 2 < cells.len() {
            BlockPayload::RunLength(runs)
        } else {
            BlockPayload::Dense(cells.iter().map(|cell| cell.id.0).collect())
        };

        ChunkDocument {
            version: CHUNK_SCHEMA_VERSION,
            coordinate,
            seed,
            dimension: dimension.get(),
            generated,
            blocks,
            metadata,
        }
    }

    /// Parses a document of any supported version, migrating old versions.
    ///
    /// # Errors
    /// [`CorruptionKind::Malformed`] if the text is not a valid document and
    /// [`CorruptionKind::UnsupportedVersion`] if it was written by a newer or
    /// unknown schema.
    pub fn parse(text: &str) -> Result<Self, CorruptionKind> {
        let probe: VersionProbe = serde_json::from_str(text)?;
        match probe.version {
            1 => Ok(serde_json::from_str::<ChunkDocumentV1>(text)?.into()),
            CHUNK_SCHEMA_VERSION => Ok(serde_json::from_str(text)?),
            other => Err(CorruptionKind::UnsupportedVersion(other)),
        }
    }

    /// Checks that the document belongs where it was found.
    pub fn validate_header(
        &self,
        coordinate: ChunkCoordinate,
        seed: WorldSeed,
        dimension: ChunkDimension,
    ) -> Result<(), CorruptionKind> {
        if self.coordinate != coordinate {
            return Err(CorruptionKind::CoordinateMismatch {
                expected: coordinate,
                found: self.coordinate,
            });
        }
        if self.seed != seed {
            return Err(CorruptionKind::SeedMismatch {
                expected: seed,
                found: self.seed,
            });
        }
        if self.dimension != dimension.get() {
            return Err(CorruptionKind::DimensionMismatch {
                expected: dimension.get(),
                found: self.dimension,
            });
        }
        Ok(())
    }

    /// Expands the payload into exactly `volume` cells and checks every block
    /// against the registry.
    pub fn decode_cells(
        &self,
        registry: &BlockRegistry,
        volume: usize,
    ) -> Result<Vec<BlockInstance>, CorruptionKind> {
        let mut cells = match &self.blocks {
            BlockPayload::Dense(ids) => {
                if ids.len() != volume {
                    return Err(CorruptionKind::CellCount {
                        expected: volume,
                        found: ids.len() as u64,
                    });
                }
                ids.iter().map(|&id| BlockInstance::new(BlockId(id))).collect()
            }
            BlockPayload::RunLength(runs) => {
                let total: u64 = runs.iter().map(|[_, count]| *count as u64).sum();
                if total != volume as u64 {
                    return Err(CorruptionKind::CellCount {
                        expected: volume,
                        found: total,
                    });
                }
                let mut cells = Vec::with_capacity(volume);
                for &[id, count] in runs {
                    let id = u16::try_from(id).map_err(|_| CorruptionKind::BlockIdOutOfRange {
                        index: cells.len(),
                        raw: id,
                    })?;
                    let block = BlockInstance::new(BlockId(id));
                    cells.extend(std::iter::repeat(block).take(count as usize));
                }
                cells
            }
        };

        for &[index, value] in &self.metadata {
            let cell = cells
                .get_mut(index as usize)
                .ok_or(CorruptionKind::MetadataOutOfRange { index })?;
            cell.metadata = u16::try_from(value)
                .map_err(|_| CorruptionKind::MetadataOutOfRange { index })?;
        }

        for (index, cell) in cells.iter().enumerate() {
            let block_type = registry
                .lookup(cell.id)
                .map_err(|_| CorruptionKind::UnknownBlock { index, id: cell.id })?;
            if cell.metadata != 0 && !block_type.supports_metadata {
                return Err(CorruptionKind::MetadataNotSupported { index, id: cell.id });
            }
        }

        Ok(cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> BlockRegistry {
        BlockRegistry::with_defaults().unwrap()
    }

    fn dimension() -> ChunkDimension {
        ChunkDimension::new(4).unwrap()
    }

    #[test]
    fn mostly_uniform_chunks_use_run_length() {
        let mut cells = vec![BlockInstance::new(BlockId::STONE); 32];
        cells.extend(vec![BlockInstance::AIR; 32]);
        let document =
            ChunkDocument::encode(ChunkCoordinate::default(), 1, dimension(), &cells, true);
        assert_eq!(
            document.blocks,
            BlockPayload::RunLength(vec![[3, 32], [0, 32]])
        );
        assert_eq!(document.decode_cells(&registry(), 64).unwrap(), cells);
    }

    #[test]
    fn noisy_chunks_use_dense_payload_and_keep_metadata() {
        let cells: Vec<_> = (0..64)
            .map(|i| match i % 3 {
                0 => BlockInstance::new(BlockId::DIRT),
                1 => BlockInstance::with_metadata(BlockId::LOG, (i % 5) as u16),
                _ => BlockInstance::AIR,
            })
            .collect();
        let document =
            ChunkDocument::encode(ChunkCoordinate::new(1, 2, 3), 9, dimension(), &cells, false);
        assert!(matches!(document.blocks, BlockPayload::Dense(_)));
        assert!(!document.metadata.is_empty());

        let text = serde_json::to_string(&document).unwrap();
        let parsed = ChunkDocument::parse(&text).unwrap();
        assert_eq!(parsed, document);
        assert_eq!(parsed.decode_cells(&registry(), 64).unwrap(), cells);
    }

    #[test]
    fn version_one_documents_are_migrated() {
        let ids: Vec<u16> = (0..64).map(|i| if i < 16 { 2 } else { 0 }).collect();
        let text = serde_json::json!({
            "version": 1,
            "coordinate": { "x": 0, "y": 0, "z": 0 },
            "seed": 5,
            "dimension": 4,
            "blocks": ids,
        })
        .to_string();
        let document = ChunkDocument::parse(&text).unwrap();
        assert_eq!(document.version, CHUNK_SCHEMA_VERSION);
        let cells = document.decode_cells(&registry(), 64).unwrap();
        assert_eq!(cells[0].id, BlockId::BEDROCK);
        assert!(cells[16].is_air());
    }

    #[test]
    fn newer_versions_are_refused() {
        let text = r#"{"version": 3, "anything": true}"#;
        assert!(matches!(
            ChunkDocument::parse(text),
            Err(CorruptionKind::UnsupportedVersion(3))
        ));
    }

    #[test]
    fn wrong_cell_counts_are_corrupt() {
        let mut document = ChunkDocument::encode(
            ChunkCoordinate::default(),
            1,
            dimension(),
            &[BlockInstance::AIR; 64],
            false,
        );
        document.blocks = BlockPayload::RunLength(vec![[0, 63]]);
        assert!(matches!(
            document.decode_cells(&registry(), 64),
            Err(CorruptionKind::CellCount { expected: 64, found: 63 })
        ));
        document.blocks = BlockPayload::Dense(vec![0; 65]);
        assert!(matches!(
            document.decode_cells(&registry(), 64),
            Err(CorruptionKind::CellCount { found: 65, .. })
        ));
    }

    #[test]
    fn unregistered_ids_and_misplaced_metadata_are_corrupt() {
        let mut document = ChunkDocument::encode(
            ChunkCoordinate::default(),
            1,
            dimension(),
            &[BlockInstance::AIR; 64],
            false,
        );
        document.blocks = BlockPayload::RunLength(vec![[0, 10], [999, 1], [0, 53]]);
        assert!(matches!(
            document.decode_cells(&registry(), 64),
            Err(CorruptionKind::UnknownBlock { index: 10, .. })
        ));

        document.blocks = BlockPayload::RunLength(vec![[0, 20], [70_000, 44]]);
        assert!(matches!(
            document.decode_cells(&registry(), 64),
            Err(CorruptionKind::BlockIdOutOfRange { index: 20, raw: 70_000 })
        ));

        document.blocks = BlockPayload::RunLength(vec![[3, 64]]);
        document.metadata = vec![[4, 1]];
        assert!(matches!(
            document.decode_cells(&registry(), 64),
            Err(CorruptionKind::MetadataNotSupported { index: 4, .. })
        ));

        document.metadata = vec![[64, 1]];
        assert!(matches!(
            document.decode_cells(&registry(), 64),
            Err(CorruptionKind::MetadataOutOfRange { index: 64 })
        ));
    }

    #[test]
    fn header_mismatches_are_reported() {
        let document = ChunkDocument::encode(
            ChunkCoordinate::new(1, 0, 0),
            7,
            dimension(),
            &[BlockInstance::AIR; 64],
            false,
        );
        assert!(document.validate_header(ChunkCoordinate::new(1, 0, 0), 7, dimension()).is_ok());
        assert!(matches!(
            document.validate_header(ChunkCoordinate::new(0, 0, 0), 7, dimension()),
            Err(CorruptionKind::CoordinateMismatch { .. })
        ));
        assert!(matches!(
            document.validate_header(ChunkCoordinate::new(1, 0, 0), 8, dimension()),
            Err(CorruptionKind::SeedMismatch { .. })
        ));
        assert!(matches!(
            document.validate_header(
                ChunkCoordinate::new(1, 0, 0),
                7,
                ChunkDimension::new(8).unwrap()
            ),
            Err(CorruptionKind::DimensionMismatch { .. })
        ));
    }
}
