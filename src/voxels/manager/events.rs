//! # Chunk Events
//!
//! Callbacks the chunk manager invokes when chunks become resident, change
//! or are unloaded. Listeners run on the owning thread, in subscription order.

use cgmath::Point3;

use crate::voxels::{block::BlockInstance, chunk::ChunkCoordinate};

/// Where a newly resident chunk's contents came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChunkSource {
    /// Read from a saved record.
    Loaded,
    /// Generated because nothing was saved.
    Generated,
    /// Generated because the saved record was corrupt or unreadable.
    Regenerated,
    /// Restored from an evicted chunk whose save had not completed.
    Restored,
}

/// Notification about a change to the resident set or to a chunk's contents.
///
/// Listeners run on the owning thread, synchronously, in subscription order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChunkEvent {
    Loaded {
        coordinate: ChunkCoordinate,
        source: ChunkSource,
    },
    BlockChanged {
        coordinate: ChunkCoordinate,
        local: Point3<i32>,
        previous: BlockInstance,
        current: BlockInstance,
    },
    Unloaded {
        coordinate: ChunkCoordinate,
    },
}

impl ChunkEvent {
    pub fn coordinate(&self) -> ChunkCoordinate {
        match *self {
            ChunkEvent::Loaded { coordinate, .. }
            | ChunkEvent::BlockChanged { coordinate, .. }
            | ChunkEvent::Unloaded { coordinate } => coordinate,
        }
    }
}

/// Callback invoked for every [`ChunkEvent`].
pub type ChunkListener = Box<dyn FnMut(&ChunkEvent) + Send>;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub(crate) struct EventBus {
    listeners: Vec<(ListenerId, ChunkListener)>,
    next_id: u64,
}

impl EventBus {
    pub(crate) fn subscribe(&mut self, listener: ChunkListener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    pub(crate) fn emit(&mut self, event: ChunkEvent) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(&event);
        }
    }
}
