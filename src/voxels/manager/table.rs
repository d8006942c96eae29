//! # Chunk Table
//!
//! The manager's owned state: which chunks are resident, which are being
//! resolved, which evicted chunks still have unsaved contents, and which saves
//! are in flight. Only the owning thread touches it; worker results reach it
//! through [`crate::task_management::task::TaskResult::handle_result`].

use std::collections::HashMap;

use log::{debug, error, warn};

use crate::voxels::{
    chunk::{Chunk, ChunkCoordinate, ChunkSnapshot},
    persistence::PersistenceError,
};

use super::events::{ChunkEvent, ChunkSource, EventBus};

/// Lifecycle state of a chunk as seen by callers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChunkState {
    /// Neither resident nor being resolved.
    Unloaded,
    /// A load-or-generate task is in flight.
    Loading,
    /// In memory; `dirty` when it holds writes not yet on disk.
    Resident { dirty: bool },
    /// In memory with a background save in flight. Still readable and writable.
    Saving,
    /// Evicted, but its contents are still waiting to reach disk.
    Evicting,
}

/// Running totals since the manager was created.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ManagerStats {
    pub loaded: u64,
    pub generated: u64,
    pub regenerated: u64,
    pub restored: u64,
    pub saved: u64,
    pub failed_saves: u64,
    pub evicted: u64,
    /// Results that arrived for chunks no longer wanted.
    pub discarded_results: u64,
}

enum Slot {
    Loading { ticket: u64 },
    Resident(Chunk),
}

/// Context that chunk task results are applied to.
#[derive(Default)]
pub struct ChunkTable {
    slots: HashMap<ChunkCoordinate, Slot>,
    /// Evicted chunks whose latest contents are not yet on disk.
    outgoing: HashMap<ChunkCoordinate, ChunkSnapshot>,
    /// Revision each in-flight save was taken at. At most one per coordinate.
    saves_in_flight: HashMap<ChunkCoordinate, u64>,
    events: EventBus,
    stats: ManagerStats,
    next_ticket: u64,
    tick: u64,
}

impl ChunkTable {
    pub(crate) fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub(crate) fn stats(&self) -> ManagerStats {
        self.stats
    }

    pub(crate) fn tick(&self) -> u64 {
        self.tick
    }

    pub(crate) fn advance_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    pub(crate) fn state_of(&self, coordinate: ChunkCoordinate) -> ChunkState {
        match self.slots.get(&coordinate) {
            Some(Slot::Loading { .. }) => ChunkState::Loading,
            Some(Slot::Resident(_)) if self.saves_in_flight.contains_key(&coordinate) => {
                ChunkState::Saving
            }
            Some(Slot::Resident(chunk)) => ChunkState::Resident {
                dirty: chunk.is_dirty(),
            },
            None if self.outgoing.contains_key(&coordinate) => ChunkState::Evicting,
            None => ChunkState::Unloaded,
        }
    }

    pub(crate) fn is_tracked(&self, coordinate: ChunkCoordinate) -> bool {
        self.slots.contains_key(&coordinate)
    }

    pub(crate) fn is_loading(&self, coordinate: ChunkCoordinate) -> bool {
        matches!(self.slots.get(&coordinate), Some(Slot::Loading { .. }))
    }

    pub(crate) fn resident(&self, coordinate: ChunkCoordinate) -> Option<&Chunk> {
        match self.slots.get(&coordinate) {
            Some(Slot::Resident(chunk)) => Some(chunk),
            _ => None,
        }
    }

    pub(crate) fn resident_mut(&mut self, coordinate: ChunkCoordinate) -> Option<&mut Chunk> {
        match self.slots.get_mut(&coordinate) {
            Some(Slot::Resident(chunk)) => Some(chunk),
            _ => None,
        }
    }

    pub(crate) fn resident_count(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, Slot::Resident(_)))
            .count()
    }

    pub(crate) fn loading_count(&self) -> usize {
        self.slots.len() - self.resident_count()
    }

    pub(crate) fn saves_in_flight(&self) -> usize {
        self.saves_in_flight.len()
    }

    pub(crate) fn outgoing_count(&self) -> usize {
        self.outgoing.len()
    }

    /// Every tracked coordinate with the tick it was last accessed at.
    /// Loading chunks report tick 0.
    pub(crate) fn tracked(&self) -> Vec<(u64, ChunkCoordinate)> {
        self.slots
            .iter()
            .map(|(coordinate, slot)| match slot {
                Slot::Loading { .. } => (0, *coordinate),
                Slot::Resident(chunk) => (chunk.last_accessed_tick(), *coordinate),
            })
            .collect()
    }

    /// Marks a chunk as being resolved and returns the ticket its result must
    /// carry to be installed.
    pub(crate) fn begin_loading(&mut self, coordinate: ChunkCoordinate) -> u64 {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.slots.insert(coordinate, Slot::Loading { ticket });
        ticket
    }

    /// Installs the result of a load-or-generate task if the chunk is still
    /// waiting for that exact task. Anything else is discarded.
    pub(crate) fn install_resolved(
        &mut self,
        coordinate: ChunkCoordinate,
        ticket: u64,
        chunk: Chunk,
        source: ChunkSource,
    ) {
        match self.slots.get(&coordinate) {
            Some(Slot::Loading { ticket: expected }) if *expected == ticket => {
                self.install(coordinate, chunk, source);
            }
            _ => {
                debug!("Discarding stale result for chunk {coordinate}");
                self.stats.discarded_results += 1;
            }
        }
    }

    /// Installs a chunk unconditionally, replacing a pending load if any.
    pub(crate) fn install(
        &mut self,
        coordinate: ChunkCoordinate,
        mut chunk: Chunk,
        source: ChunkSource,
    ) {
        chunk.touch(self.tick);
        match source {
            ChunkSource::Loaded => self.stats.loaded += 1,
            ChunkSource::Generated => self.stats.generated += 1,
            ChunkSource::Regenerated => self.stats.regenerated += 1,
            ChunkSource::Restored => self.stats.restored += 1,
        }
        self.slots.insert(coordinate, Slot::Resident(chunk));
        debug!("Chunk {coordinate} resident ({source:?})");
        self.events.emit(ChunkEvent::Loaded { coordinate, source });
    }

    /// Brings an evicted chunk with unsaved contents back from memory.
    ///
    /// # Returns
    /// `true` if the coordinate had such contents.
    pub(crate) fn restore_outgoing(&mut self, coordinate: ChunkCoordinate) -> bool {
        match self.outgoing.remove(&coordinate) {
            Some(snapshot) => {
                self.install(coordinate, Chunk::from_snapshot(snapshot), ChunkSource::Restored);
                true
            }
            None => false,
        }
    }

    /// Drops a chunk from the resident set, or cancels its pending load.
    /// Dirty contents are kept as an outgoing snapshot until a save lands.
    pub(crate) fn evict(&mut self, coordinate: ChunkCoordinate) {
        match self.slots.remove(&coordinate) {
            Some(Slot::Loading { .. }) => {
                debug!("Cancelled load of chunk {coordinate}");
            }
            Some(Slot::Resident(chunk)) => {
                if chunk.is_dirty() {
                    self.outgoing.insert(coordinate, chunk.snapshot());
                }
                self.stats.evicted += 1;
                debug!("Evicted chunk {coordinate}");
                self.events.emit(ChunkEvent::Unloaded { coordinate });
            }
            None => {}
        }
    }

    /// Removes every pending load. Returns how many were cancelled.
    pub(crate) fn cancel_loading(&mut self) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| matches!(slot, Slot::Resident(_)));
        before - self.slots.len()
    }

    /// Snapshots of dirty resident chunks with no save in flight, marking a
    /// save in flight for each.
    pub(crate) fn take_dirty_snapshots(&mut self) -> Vec<ChunkSnapshot> {
        let mut snapshots = Vec::new();
        for (coordinate, slot) in self.slots.iter() {
            if let Slot::Resident(chunk) = slot {
                if chunk.is_dirty() && !self.saves_in_flight.contains_key(coordinate) {
                    snapshots.push(chunk.snapshot());
                }
            }
        }
        for snapshot in &snapshots {
            self.saves_in_flight.insert(snapshot.coordinate(), snapshot.revision());
        }
        snapshots
    }

    /// Outgoing snapshots with no save in flight, marking a save in flight for each.
    pub(crate) fn take_outgoing_snapshots(&mut self) -> Vec<ChunkSnapshot> {
        let snapshots: Vec<ChunkSnapshot> = self
            .outgoing
            .iter()
            .filter(|(coordinate, _)| !self.saves_in_flight.contains_key(coordinate))
            .map(|(_, snapshot)| snapshot.clone())
            .collect();
        for snapshot in &snapshots {
            self.saves_in_flight.insert(snapshot.coordinate(), snapshot.revision());
        }
        snapshots
    }

    /// Applies the outcome of a background save.
    ///
    /// On success the live chunk is marked clean only if no write landed after
    /// the snapshot was taken, and an outgoing snapshot is dropped only if it
    /// is the one that was saved. On failure everything stays dirty and is
    /// retried by the next flush or region update.
    pub(crate) fn finish_save(
        &mut self,
        coordinate: ChunkCoordinate,
        revision: u64,
        outcome: Result<(), PersistenceError>,
    ) {
        self.saves_in_flight.remove(&coordinate);

        if let Err(err) = outcome {
            self.stats.failed_saves += 1;
            error!("Failed to save chunk {coordinate}, will retry: {err}");
            return;
        }
        self.stats.saved += 1;

        if let Some(Slot::Resident(chunk)) = self.slots.get_mut(&coordinate) {
            if chunk.revision() == revision {
                chunk.mark_clean();
            } else {
                debug!("Chunk {coordinate} was written during its save and stays dirty");
            }
        }
        if self
            .outgoing
            .get(&coordinate)
            .is_some_and(|snapshot| snapshot.revision() == revision)
        {
            self.outgoing.remove(&coordinate);
        }
    }

    /// Empties the table for shutdown.
    ///
    /// # Returns
    /// Snapshots of everything that still needs saving, sorted by coordinate.
    pub(crate) fn drain_unsaved(&mut self) -> Vec<ChunkSnapshot> {
        let mut unsaved = Vec::new();
        let mut coordinates: Vec<ChunkCoordinate> = self.slots.keys().copied().collect();
        coordinates.sort();
        for coordinate in coordinates {
            if let Some(Slot::Resident(chunk)) = self.slots.remove(&coordinate) {
                if chunk.is_dirty() {
                    unsaved.push(chunk.snapshot());
                }
                self.events.emit(ChunkEvent::Unloaded { coordinate });
            }
        }
        unsaved.extend(self.outgoing.drain().map(|(_, snapshot)| snapshot));
        if !self.saves_in_flight.is_empty() {
            warn!(
                "{} saves were still in flight at shutdown and will be redone",
                self.saves_in_flight.len()
            );
            self.saves_in_flight.clear();
        }
        unsaved.sort_by_key(|snapshot| snapshot.coordinate());
        unsaved.dedup_by_key(|snapshot| snapshot.coordinate());
        unsaved
    }
}
