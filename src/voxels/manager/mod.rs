//! # Chunk Manager Module
//!
//! The `ChunkManager` owns every resident chunk and keeps the resident set in
//! step with a moving point of interest.
//!
//! ## Lifecycle
//!
//! Per chunk: `Unloaded → Loading → Resident(clean)`, then
//! `Resident(dirty)` on any write, `Saving` while a background save runs, and
//! back to `Unloaded` on eviction. A dirty chunk that is evicted before its
//! save lands is `Evicting` until it does; re-requesting it in that state
//! restores it from memory instead of reading stale data from disk.
//!
//! ## Threading
//!
//! Loading, generating and saving run on the worker pool. The manager is the
//! only thing that mutates the chunk table, and it does so on the owning thread
//! when it applies task results (see [`ChunkManager::process_completed`]).
//!
//! Reads and writes to a chunk that is still loading block the caller until
//! the load lands, bounded by the configured task timeout. Past that bound the
//! chunk is resolved on the calling thread, so no call blocks indefinitely and
//! none returns placeholder data.

use std::{sync::Arc, time::Duration};

use cgmath::Point3;
use log::{debug, error, info, warn};
use web_time::Instant;

use crate::{config::MAX_ACTIVE_RADIUS, task_management::TaskManager};

use super::{
    block::{BlockInstance, BlockRegistry},
    chunk::{local_position, Chunk, ChunkCoordinate, ChunkDimension, ChunkSnapshot},
    generation::WorldGenerator,
    persistence::ChunkPersistence,
    tasks::{resolve_chunk, ChunkResolutionTask, ChunkSaveTask},
};

pub mod error;
pub mod events;
pub mod table;

pub use error::ManagerError;
pub use events::{ChunkEvent, ChunkListener, ChunkSource, ListenerId};
pub use table::{ChunkState, ChunkTable, ManagerStats};

/// Number of attempts made for each chunk save at shutdown.
const SHUTDOWN_SAVE_ATTEMPTS: usize = 2;

/// Runtime knobs of the chunk manager.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManagerSettings {
    /// Number of worker threads; `0` runs tasks inline.
    pub worker_count: usize,
    /// Extra ring of chunks kept resident beyond the active radius before
    /// they are evicted.
    pub unload_margin: u32,
    /// Largest radius an active region may have; larger requests are clamped.
    pub max_radius: u32,
    /// Upper bound on any blocking wait for a task.
    pub task_timeout: Duration,
    /// Tasks running longer than this are reported.
    pub stuck_task_threshold: Duration,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        ManagerSettings {
            worker_count: 4,
            unload_margin: 0,
            max_radius: MAX_ACTIVE_RADIUS,
            task_timeout: Duration::from_millis(5000),
            stuck_task_threshold: Duration::from_millis(1000),
        }
    }
}

/// What a call to [`ChunkManager::update_active_region`] did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegionUpdate {
    /// Chunks evicted (or whose pending loads were cancelled), oldest access first.
    pub evicted: Vec<ChunkCoordinate>,
    /// Chunks for which a load-or-generate task was issued, closest first.
    pub requested: Vec<ChunkCoordinate>,
    /// Evicted chunks brought back from memory.
    pub restored: Vec<ChunkCoordinate>,
}

/// Outcome of [`ChunkManager::shutdown`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Chunks written during shutdown.
    pub saved: usize,
    /// Chunks whose unsaved changes could not be written and are lost.
    pub failed: Vec<ChunkCoordinate>,
    /// Pending loads that were abandoned.
    pub cancelled_loads: usize,
}

/// All chunk coordinates within `radius` (euclidean, in chunk units) of
/// `center`, closest first.
pub fn required_coordinates(center: ChunkCoordinate, radius: u32) -> Vec<ChunkCoordinate> {
    let r = radius as i32;
    let r_squared = radius as i64 * radius as i64;
    let mut coordinates = Vec::new();
    for dz in -r..=r {
        for dy in -r..=r {
            for dx in -r..=r {
                let coordinate = center.offset(dx, dy, dz);
                if coordinate.distance_squared(&center) <= r_squared {
                    coordinates.push(coordinate);
                }
            }
        }
    }
    coordinates.sort_by_key(|coordinate| (coordinate.distance_squared(&center), *coordinate));
    coordinates
}

/// Owns the resident chunk set and answers block queries against it.
pub struct ChunkManager {
    table: ChunkTable,
    tasks: TaskManager<ChunkTable>,
    registry: Arc<BlockRegistry>,
    generator: Arc<WorldGenerator>,
    persistence: Arc<ChunkPersistence>,
    settings: ManagerSettings,
    dimension: ChunkDimension,
    shut_down: bool,
}

impl ChunkManager {
    /// Creates a manager and starts its worker pool.
    ///
    /// # Arguments
    /// * `registry` - Catalog writes are validated against
    /// * `generator` - Produces chunks that were never saved
    /// * `persistence` - Chunk store for the world
    /// * `settings` - Worker count, hysteresis and timeouts
    pub fn new(
        registry: Arc<BlockRegistry>,
        generator: Arc<WorldGenerator>,
        persistence: Arc<ChunkPersistence>,
        settings: ManagerSettings,
    ) -> Self {
        let dimension = generator.dimension();
        ChunkManager {
            table: ChunkTable::default(),
            tasks: TaskManager::new(settings.worker_count),
            registry,
            generator,
            persistence,
            settings,
            dimension,
            shut_down: false,
        }
    }

    pub fn dimension(&self) -> ChunkDimension {
        self.dimension
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    fn ensure_running(&self, coordinate: ChunkCoordinate) -> Result<(), ManagerError> {
        if self.shut_down {
            Err(ManagerError::ChunkUnavailable(coordinate))
        } else {
            Ok(())
        }
    }

    /// Makes the chunks within `radius` of `center` the active region.
    /// `radius` is clamped to [`ManagerSettings::max_radius`].
    ///
    /// Chunks outside `radius + unload_margin` are evicted first, oldest access
    /// first; dirty ones keep their contents in memory until their save lands.
    /// Then a load-or-generate task is issued for every required chunk that is
    /// not already resident or loading, closest first.
    ///
    /// # Errors
    /// [`ManagerError::ChunkUnavailable`] after shutdown.
    pub fn update_active_region(
        &mut self,
        center: ChunkCoordinate,
        radius: u32,
    ) -> Result<RegionUpdate, ManagerError> {
        self.ensure_running(center)?;
        self.table.advance_tick();
        self.process_completed();

        let mut update = RegionUpdate::default();

        if radius > self.settings.max_radius {
            warn!("Active radius {radius} clamped to {}", self.settings.max_radius);
        }
        let radius = radius.min(self.settings.max_radius);
        let keep_radius = radius.saturating_add(self.settings.unload_margin) as i64;
        let keep_squared = keep_radius.saturating_mul(keep_radius);
        let mut leaving: Vec<(u64, ChunkCoordinate)> = self
            .table
            .tracked()
            .into_iter()
            .filter(|(_, coordinate)| coordinate.distance_squared(&center) > keep_squared)
            .collect();
        leaving.sort();
        for (_, coordinate) in leaving {
            self.table.evict(coordinate);
            update.evicted.push(coordinate);
        }

        for coordinate in required_coordinates(center, radius) {
            if self.table.is_tracked(coordinate) {
                continue;
            }
            if self.table.restore_outgoing(coordinate) {
                update.restored.push(coordinate);
                continue;
            }
            let ticket = self.table.begin_loading(coordinate);
            self.tasks.publish_task(Box::new(ChunkResolutionTask::new(
                coordinate,
                ticket,
                self.generator.clone(),
                self.persistence.clone(),
            )));
            update.requested.push(coordinate);
        }

        let outgoing = self.table.take_outgoing_snapshots();
        let retried = self.dispatch_saves(outgoing);
        debug!(
            "Active region around {center} (r={radius}): {} evicted, {} requested, \
             {} restored, {retried} saves issued",
            update.evicted.len(),
            update.requested.len(),
            update.restored.len()
        );
        Ok(update)
    }

    /// Applies finished task results and reports stuck tasks. Call once per tick.
    ///
    /// # Returns
    /// The number of results applied.
    pub fn process_completed(&mut self) -> usize {
        let handled = self.tasks.process_completed_tasks(&mut self.table);
        self.tasks.warn_stuck_tasks(self.settings.stuck_task_threshold);
        handled
    }

    /// Blocks until every outstanding task has finished, or the task timeout
    /// passes without progress.
    ///
    /// # Returns
    /// `true` if the manager is idle.
    pub fn wait_until_idle(&mut self) -> bool {
        while !self.tasks.is_idle() {
            self.process_completed();
            if self.tasks.is_idle() {
                break;
            }
            if !self.tasks.wait_for_result(&mut self.table, self.settings.task_timeout) {
                warn!(
                    "No chunk task finished within {:?}; {} still outstanding",
                    self.settings.task_timeout,
                    self.tasks.in_flight_count() + self.tasks.queued_count()
                );
                return self.tasks.is_idle();
            }
        }
        true
    }

    /// Starts a background save of every dirty resident chunk and retries
    /// saves of evicted chunks that failed earlier.
    ///
    /// Saves serialize a snapshot, so the chunks stay writable meanwhile; a
    /// write that lands during the save keeps the chunk dirty.
    ///
    /// # Returns
    /// The number of saves issued.
    pub fn flush_dirty(&mut self) -> Result<usize, ManagerError> {
        self.ensure_running(ChunkCoordinate::default())?;
        let mut snapshots = self.table.take_dirty_snapshots();
        snapshots.extend(self.table.take_outgoing_snapshots());
        Ok(self.dispatch_saves(snapshots))
    }

    fn dispatch_saves(&mut self, snapshots: Vec<ChunkSnapshot>) -> usize {
        let count = snapshots.len();
        for snapshot in snapshots {
            self.tasks
                .publish_task(Box::new(ChunkSaveTask::new(snapshot, self.persistence.clone())));
        }
        count
    }

    /// Makes sure the chunk at `coordinate` is resident and returns it.
    fn resolve(&mut self, coordinate: ChunkCoordinate) -> Result<&mut Chunk, ManagerError> {
        self.ensure_running(coordinate)?;

        if self.table.is_loading(coordinate) {
            self.wait_for_load(coordinate);
        }
        if !self.table.is_tracked(coordinate) && !self.table.restore_outgoing(coordinate) {
            let (chunk, source) = resolve_chunk(coordinate, &self.persistence, &self.generator);
            self.table.install(coordinate, chunk, source);
        } else if self.table.is_loading(coordinate) {
            warn!(
                "Chunk {coordinate} did not load within {:?}, resolving it on the calling thread",
                self.settings.task_timeout
            );
            let (chunk, source) = resolve_chunk(coordinate, &self.persistence, &self.generator);
            self.table.install(coordinate, chunk, source);
        }

        let tick = self.table.tick();
        let chunk = self
            .table
            .resident_mut(coordinate)
            .ok_or(ManagerError::ChunkUnavailable(coordinate))?;
        chunk.touch(tick);
        Ok(chunk)
    }

    /// Applies task results until the chunk's load lands or the timeout passes.
    fn wait_for_load(&mut self, coordinate: ChunkCoordinate) {
        let deadline = Instant::now() + self.settings.task_timeout;
        while self.table.is_loading(coordinate) {
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            let applied = self.tasks.wait_for_result(&mut self.table, deadline - now);
            if !applied && self.tasks.is_idle() {
                return;
            }
        }
    }

    /// Reads the block at a world position, loading its chunk if needed.
    ///
    /// # Errors
    /// [`ManagerError::ChunkUnavailable`] after shutdown.
    pub fn get_block(&mut self, world: Point3<i32>) -> Result<BlockInstance, ManagerError> {
        let coordinate = ChunkCoordinate::containing(world, self.dimension);
        let local = local_position(world, self.dimension);
        let chunk = self.resolve(coordinate)?;
        Ok(chunk.get_block(local)?)
    }

    /// Writes the block at a world position, loading its chunk if needed, and
    /// marks the chunk dirty.
    ///
    /// # Returns
    /// The block previously at that position.
    ///
    /// # Errors
    /// - [`ManagerError::Registry`] if the block type is not registered
    /// - [`ManagerError::MetadataNotSupported`] if the block carries metadata
    ///   its type does not allow
    /// - [`ManagerError::ChunkUnavailable`] after shutdown
    pub fn set_block(
        &mut self,
        world: Point3<i32>,
        block: BlockInstance,
    ) -> Result<BlockInstance, ManagerError> {
        let block_type = self.registry.lookup(block.id)?;
        if block.metadata != 0 && !block_type.supports_metadata {
            return Err(ManagerError::MetadataNotSupported(block.id));
        }

        let coordinate = ChunkCoordinate::containing(world, self.dimension);
        let local = local_position(world, self.dimension);
        let previous = self.resolve(coordinate)?.set_block(local, block)?;

        if previous != block {
            self.table.events_mut().emit(ChunkEvent::BlockChanged {
                coordinate,
                local,
                previous,
                current: block,
            });
        }
        Ok(previous)
    }

    /// Borrows a resident chunk. The borrow ends before the manager can evict it.
    pub fn chunk(&self, coordinate: ChunkCoordinate) -> Option<&Chunk> {
        self.table.resident(coordinate)
    }

    pub fn state_of(&self, coordinate: ChunkCoordinate) -> ChunkState {
        self.table.state_of(coordinate)
    }

    pub fn resident_count(&self) -> usize {
        self.table.resident_count()
    }

    /// Chunks with a load-or-generate task in flight.
    pub fn pending_loads(&self) -> usize {
        self.table.loading_count()
    }

    /// Saves currently running on workers.
    pub fn pending_saves(&self) -> usize {
        self.table.saves_in_flight()
    }

    /// Evicted chunks whose contents have not reached disk yet.
    pub fn unsaved_evictions(&self) -> usize {
        self.table.outgoing_count()
    }

    pub fn stats(&self) -> ManagerStats {
        self.table.stats()
    }

    /// Registers a callback for chunk events.
    pub fn subscribe(&mut self, listener: impl FnMut(&ChunkEvent) + Send + 'static) -> ListenerId {
        self.table.events_mut().subscribe(Box::new(listener))
    }

    /// Removes a callback. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.table.events_mut().unsubscribe(id)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Stops the manager and persists everything that is still dirty.
    ///
    /// Pending loads are cancelled and in-flight saves are given up to the task
    /// timeout to land. Idle workers are then joined and busy ones detached.
    /// Every remaining dirty chunk (resident or evicted) is written on the
    /// calling thread; chunks that still cannot be written are logged and
    /// listed in the report.
    ///
    /// Every later call on the manager fails with
    /// [`ManagerError::ChunkUnavailable`]. Calling this twice is harmless.
    pub fn shutdown(&mut self) -> ShutdownReport {
        if self.shut_down {
            return ShutdownReport::default();
        }
        self.shut_down = true;

        let mut report = ShutdownReport {
            cancelled_loads: self.table.cancel_loading(),
            ..ShutdownReport::default()
        };

        let deadline = Instant::now() + self.settings.task_timeout;
        while !self.tasks.is_idle() {
            let now = Instant::now();
            if now >= deadline {
                warn!("Chunk tasks still running {:?} into shutdown", self.settings.task_timeout);
                break;
            }
            self.tasks.wait_for_result(&mut self.table, deadline - now);
        }
        let detached = self.tasks.shutdown();
        if detached > 0 {
            warn!("Detached {detached} busy chunk workers; their results are discarded");
        }

        for snapshot in self.table.drain_unsaved() {
            let coordinate = snapshot.coordinate();
            let mut saved = false;
            for attempt in 1..=SHUTDOWN_SAVE_ATTEMPTS {
                match self.persistence.write_snapshot(&snapshot) {
                    Ok(()) => {
                        saved = true;
                        break;
                    }
                    Err(err) => warn!(
                        "Saving chunk {coordinate} at shutdown failed (attempt {attempt}): {err}"
                    ),
                }
            }
            if saved {
                report.saved += 1;
            } else {
                error!("Chunk {coordinate} could not be saved at shutdown; its changes are lost");
                report.failed.push(coordinate);
            }
        }

        info!(
            "Chunk manager shut down: {} chunks saved, {} lost, {} loads cancelled",
            report.saved,
            report.failed.len(),
            report.cancelled_loads
        );
        report
    }
}

impl Drop for ChunkManager {
    fn drop(&mut self) {
        if !self.shut_down {
            self.shutdown();
        }
    }
}
