//! # Persistence Module
//!
//! Reads and writes chunks and world metadata as versioned JSON documents.
//!
//! ## Contract
//! - [`ChunkPersistence::load`] fails with [`PersistenceError::NotFound`] when
//!   no record exists and [`PersistenceError::CorruptData`] when the record
//!   cannot be parsed or validated. Callers regenerate in both cases.
//! - [`ChunkPersistence::save`] only writes dirty chunks and clears the dirty
//!   flag on success. On failure the chunk stays dirty so the write can be
//!   retried.
//! - Every write goes to a temporary file that is renamed over the target, so
//!   a crash mid-write leaves the previous version intact.
//!
//! Persistence is shared with worker threads behind an `Arc`; it holds no
//! mutable state of its own.

use std::{fs, io, path::Path, sync::Arc};

use crate::voxels::{
    block::BlockRegistry,
    chunk::{Chunk, ChunkCoordinate, ChunkDimension, ChunkSnapshot},
    generation::WorldSeed,
};

pub mod error;
pub mod meta;
pub mod paths;
pub mod schema;

pub use error::{CorruptionKind, PersistenceError};
pub use meta::WorldMeta;
pub use paths::SaveLayout;
pub use schema::{ChunkDocument, CHUNK_SCHEMA_VERSION};

/// Chunk and world-meta storage for one world.
pub struct ChunkPersistence {
    layout: SaveLayout,
    registry: Arc<BlockRegistry>,
    seed: WorldSeed,
    dimension: ChunkDimension,
}

impl ChunkPersistence {
    /// Creates the store. Nothing touches the disk until the first write.
    ///
    /// # Arguments
    /// * `layout` - Where the world's files live
    /// * `registry` - Catalog used to validate block ids on load
    /// * `seed` - Seed tag written into, and required of, every chunk document
    /// * `dimension` - Chunk edge length every document must match
    pub fn new(
        layout: SaveLayout,
        registry: Arc<BlockRegistry>,
        seed: WorldSeed,
        dimension: ChunkDimension,
    ) -> Self {
        ChunkPersistence {
            layout,
            registry,
            seed,
            dimension,
        }
    }

    pub fn layout(&self) -> &SaveLayout {
        &self.layout
    }

    /// Returns `true` if a record exists for the chunk.
    pub fn exists(&self, coordinate: ChunkCoordinate) -> bool {
        self.layout.chunk_path(coordinate).is_file()
    }

    /// Reads and validates the saved chunk at `coordinate`.
    ///
    /// The returned chunk is clean.
    ///
    /// # Errors
    /// - [`PersistenceError::NotFound`] if nothing was saved for the chunk
    /// - [`PersistenceError::CorruptData`] if the document is malformed, from
    ///   an unsupported schema, written for a different seed or dimension, the
    ///   wrong size, or references unregistered blocks
    /// - [`PersistenceError::Io`] for any other read failure
    pub fn load(&self, coordinate: ChunkCoordinate) -> Result<Chunk, PersistenceError> {
        let path = self.layout.chunk_path(coordinate);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(PersistenceError::NotFound(coordinate))
            }
            Err(err) => return Err(PersistenceError::io(path, err)),
        };

        let corrupt = |kind: CorruptionKind| PersistenceError::corrupt(&path, kind);
        let document = ChunkDocument::parse(&text).map_err(corrupt)?;
        document
            .validate_header(coordinate, self.seed, self.dimension)
            .map_err(corrupt)?;
        let cells = document
            .decode_cells(&self.registry, self.dimension.volume())
            .map_err(corrupt)?;

        let mut chunk = Chunk::from_cells(coordinate, self.dimension, cells)
            .map_err(|err| corrupt(err.into()))?;
        chunk.set_generated(document.generated);
        log::trace!("Loaded chunk {coordinate} from {}", path.display());
        Ok(chunk)
    }

    /// Writes the chunk if it is dirty and clears its dirty flag.
    ///
    /// # Returns
    /// `true` if anything was written, `false` for a clean chunk.
    ///
    /// # Errors
    /// [`PersistenceError::Io`] or [`PersistenceError::Encode`]; the chunk
    /// stays dirty.
    pub fn save(&self, chunk: &mut Chunk) -> Result<bool, PersistenceError> {
        if !chunk.is_dirty() {
            return Ok(false);
        }
        self.write_snapshot(&chunk.snapshot())?;
        chunk.mark_clean();
        Ok(true)
    }

    /// Writes a snapshot unconditionally. Used by background saves, which
    /// serialize a copy so the live chunk stays writable meanwhile.
    pub fn write_snapshot(&self, snapshot: &ChunkSnapshot) -> Result<(), PersistenceError> {
        let document = ChunkDocument::encode(
            snapshot.coordinate(),
            self.seed,
            snapshot.dimension(),
            snapshot.cells(),
            snapshot.is_generated(),
        );
        self.write_document(&document)
    }

    fn write_document(&self, document: &ChunkDocument) -> Result<(), PersistenceError> {
        let bytes = serde_json::to_vec(document)?;
        write_atomically(&self.layout.chunk_path(document.coordinate), &bytes)?;
        log::trace!("Saved chunk {}", document.coordinate);
        Ok(())
    }

    /// Coordinates of every chunk with a record on disk, sorted.
    pub fn saved_chunks(&self) -> Result<Vec<ChunkCoordinate>, PersistenceError> {
        let dir = self.layout.chunks_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(PersistenceError::io(dir, err)),
        };

        let mut coordinates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| PersistenceError::io(&dir, err))?;
            if let Some(coordinate) = entry
                .file_name()
                .to_str()
                .and_then(paths::parse_chunk_file_name)
            {
                coordinates.push(coordinate);
            }
        }
        coordinates.sort();
        Ok(coordinates)
    }

    /// Returns `true` if the world has saved metadata.
    pub fn world_exists(&self) -> bool {
        self.layout.world_exists()
    }

    /// Writes `world_meta.json`.
    pub fn save_meta(&self, meta: &WorldMeta) -> Result<(), PersistenceError> {
        let bytes = serde_json::to_vec_pretty(meta)?;
        write_atomically(&self.layout.meta_path(), &bytes)
    }

    /// Reads `world_meta.json`.
    ///
    /// # Errors
    /// [`PersistenceError::Io`] if the file cannot be read (including when it
    /// does not exist) and [`PersistenceError::CorruptData`] if it cannot be
    /// parsed or comes from a newer schema.
    pub fn load_meta(&self) -> Result<WorldMeta, PersistenceError> {
        let path = self.layout.meta_path();
        let text = fs::read_to_string(&path).map_err(|err| PersistenceError::io(&path, err))?;
        WorldMeta::parse(&text).map_err(|kind| PersistenceError::corrupt(&path, kind))
    }
}

/// Returns `true` if a world called `world_name` has been saved under `save_root`.
pub fn world_exists(save_root: impl AsRef<Path>, world_name: &str) -> bool {
    SaveLayout::new(save_root, world_name).world_exists()
}

/// Writes `bytes` to a sibling temporary file and renames it over `path`.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| PersistenceError::io(parent, err))?;
    }
    let temporary = paths::temporary_path(path);
    fs::write(&temporary, bytes).map_err(|err| PersistenceError::io(&temporary, err))?;
    fs::rename(&temporary, path).map_err(|err| PersistenceError::io(path, err))
}
