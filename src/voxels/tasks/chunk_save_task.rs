use std::sync::Arc;

use crate::{
    task_management::task::{Task, TaskResult},
    voxels::{
        chunk::{ChunkCoordinate, ChunkSnapshot},
        manager::table::ChunkTable,
        persistence::{ChunkPersistence, PersistenceError},
    },
};

/// Writes a chunk snapshot on a worker thread.
///
/// The snapshot was taken on the owning thread, so the live chunk stays
/// readable and writable while this runs.
pub struct ChunkSaveTask {
    snapshot: ChunkSnapshot,
    persistence: Arc<ChunkPersistence>,
}

impl ChunkSaveTask {
    pub fn new(snapshot: ChunkSnapshot, persistence: Arc<ChunkPersistence>) -> Self {
        ChunkSaveTask { snapshot, persistence }
    }
}

impl Task<ChunkTable> for ChunkSaveTask {
    fn process(&self) -> Box<dyn TaskResult<ChunkTable> + Send> {
        Box::new(ChunkSaveTaskResult {
            coordinate: self.snapshot.coordinate(),
            revision: self.snapshot.revision(),
            outcome: self.persistence.write_snapshot(&self.snapshot),
        })
    }

    fn label(&self) -> String {
        format!("save chunk {}", self.snapshot.coordinate())
    }
}

pub struct ChunkSaveTaskResult {
    coordinate: ChunkCoordinate,
    /// Revision of the snapshot that was written.
    revision: u64,
    outcome: Result<(), PersistenceError>,
}

impl TaskResult<ChunkTable> for ChunkSaveTaskResult {
    fn handle_result(
        self: Box<Self>,
        table: &mut ChunkTable,
    ) -> Vec<Box<dyn Task<ChunkTable> + Send>> {
        let result = *self;
        table.finish_save(result.coordinate, result.revision, result.outcome);
        Vec::new()
    }
}
