//! # Chunk Resolution Task
//!
//! This module defines the `ChunkResolutionTask`, which produces the contents
//! of a chunk that has become required: the saved record if there is a usable
//! one, freshly generated terrain otherwise.

use std::sync::Arc;

use log::error;

use crate::{
    task_management::task::{Task, TaskResult},
    voxels::{
        chunk::{Chunk, ChunkCoordinate},
        generation::WorldGenerator,
        manager::{table::ChunkTable, ChunkSource},
        persistence::{ChunkPersistence, PersistenceError},
    },
};

/// Loads the chunk at `coordinate`, falling back to generation.
///
/// A missing record means the chunk was never saved. A corrupt or unreadable
/// record is logged and replaced by generated terrain; the saved edits in it
/// are lost. Never fails.
pub fn resolve_chunk(
    coordinate: ChunkCoordinate,
    persistence: &ChunkPersistence,
    generator: &WorldGenerator,
) -> (Chunk, ChunkSource) {
    match persistence.load(coordinate) {
        Ok(chunk) => (chunk, ChunkSource::Loaded),
        Err(PersistenceError::NotFound(_)) => {
            (generator.generate(coordinate), ChunkSource::Generated)
        }
        Err(err) => {
            error!(
                "Saved data for chunk {coordinate} is unusable, regenerating; \
                 its saved edits are lost: {err}"
            );
            (generator.generate(coordinate), ChunkSource::Regenerated)
        }
    }
}

/// A task that loads or generates one chunk on a worker thread.
pub struct ChunkResolutionTask {
    coordinate: ChunkCoordinate,
    /// Ticket of the load this task serves; stale tickets are discarded.
    ticket: u64,
    generator: Arc<WorldGenerator>,
    persistence: Arc<ChunkPersistence>,
}

impl ChunkResolutionTask {
    /// Creates a new chunk resolution task.
    ///
    /// # Arguments
    /// * `coordinate` - The chunk to resolve
    /// * `ticket` - Identifies the pending load in the chunk table
    /// * `generator` - Shared world generator
    /// * `persistence` - Shared chunk store
    pub fn new(
        coordinate: ChunkCoordinate,
        ticket: u64,
        generator: Arc<WorldGenerator>,
        persistence: Arc<ChunkPersistence>,
    ) -> Self {
        ChunkResolutionTask {
            coordinate,
            ticket,
            generator,
            persistence,
        }
    }
}

impl Task<ChunkTable> for ChunkResolutionTask {
    fn process(&self) -> Box<dyn TaskResult<ChunkTable> + Send> {
        let (chunk, source) = resolve_chunk(self.coordinate, &self.persistence, &self.generator);
        Box::new(ChunkResolutionTaskResult {
            coordinate: self.coordinate,
            ticket: self.ticket,
            chunk,
            source,
        })
    }

    fn label(&self) -> String {
        format!("resolve chunk {}", self.coordinate)
    }
}

/// The resolved chunk, on its way back to the owning thread.
pub struct ChunkResolutionTaskResult {
    coordinate: ChunkCoordinate,
    ticket: u64,
    chunk: Chunk,
    source: ChunkSource,
}

impl TaskResult<ChunkTable> for ChunkResolutionTaskResult {
    /// Installs the chunk unless its load was cancelled or superseded.
    fn handle_result(
        self: Box<Self>,
        table: &mut ChunkTable,
    ) -> Vec<Box<dyn Task<ChunkTable> + Send>> {
        let result = *self;
        table.install_resolved(result.coordinate, result.ticket, result.chunk, result.source);
        Vec::new()
    }
}
