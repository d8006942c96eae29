//! # Chunk Module
//!
//! This module provides the `Chunk` struct: a fixed-size cube of voxels that is
//! the unit of generation, loading, persistence and eviction.
//!
//! ## Storage
//!
//! Chunks keep two parallel structures:
//! - `cells`: a dense array of [`BlockInstance`] (four bytes each), `Dim³` long,
//!   stored in row-major order (x, then y, then z)
//! - `occupancy`: a bit vector (1 bit per cell) marking which cells are not air
//!
//! The dense array gives O(1) reads and writes. The occupancy bits let
//! [`Chunk::iter_non_empty`] skip air in word-sized strides, which matters
//! because most chunks above the surface are almost entirely air.
//!
//! Consumers never see this layout: they address cells by local position and
//! enumerate contents through the non-empty iterator.

use bitvec::prelude::BitVec;
use cgmath::Point3;
use serde::{Deserialize, Serialize};

use super::block::BlockInstance;

mod chunk_creation;
pub mod chunk_iteration;
pub mod coordinate;
pub mod error;

pub use chunk_creation::ChunkBuilder;
pub use chunk_iteration::NonEmptyBlocks;
pub use coordinate::{local_position, ChunkCoordinate};
pub use error::ChunkError;

/// The default chunk edge length in blocks.
pub const DEFAULT_CHUNK_DIMENSION: u32 = 16;

/// Edge length of a chunk in blocks. Always a power of two.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct ChunkDimension(u32);

impl ChunkDimension {
    /// Smallest supported edge length.
    pub const MIN: u32 = 2;
    /// Largest supported edge length.
    pub const MAX: u32 = 64;

    /// Validates an edge length.
    ///
    /// # Errors
    /// [`ChunkError::InvalidDimension`] unless `value` is a power of two in
    /// `[MIN, MAX]`.
    pub fn new(value: u32) -> Result<Self, ChunkError> {
        if value.is_power_of_two() && (Self::MIN..=Self::MAX).contains(&value) {
            Ok(ChunkDimension(value))
        } else {
            Err(ChunkError::InvalidDimension(value))
        }
    }

    /// The edge length as an unsigned value.
    pub fn get(&self) -> u32 {
        self.0
    }

    /// The edge length as a signed value, for world-coordinate arithmetic.
    pub fn edge(&self) -> i32 {
        self.0 as i32
    }

    /// Number of cells in one horizontal plane (`Dim²`).
    pub fn plane_size(&self) -> usize {
        (self.0 * self.0) as usize
    }

    /// Number of cells in a chunk (`Dim³`).
    pub fn volume(&self) -> usize {
        self.plane_size() * self.0 as usize
    }

    /// Returns `true` if every component of `local` is within `[0, Dim)`.
    pub fn contains(&self, local: Point3<i32>) -> bool {
        let edge = self.edge();
        (0..edge).contains(&local.x) && (0..edge).contains(&local.y) && (0..edge).contains(&local.z)
    }

    /// Cell index of a local position. The caller guarantees it is in range.
    fn index_unchecked(&self, local: Point3<i32>) -> usize {
        let edge = self.0 as usize;
        local.x as usize + edge * local.y as usize + self.plane_size() * local.z as usize
    }

    /// Local position of a cell index.
    pub fn position_of(&self, index: usize) -> Point3<i32> {
        let edge = self.0 as usize;
        Point3::new(
            (index % edge) as i32,
            ((index / edge) % edge) as i32,
            (index / self.plane_size()) as i32,
        )
    }
}

impl Default for ChunkDimension {
    fn default() -> Self {
        ChunkDimension(DEFAULT_CHUNK_DIMENSION)
    }
}

impl TryFrom<u32> for ChunkDimension {
    type Error = ChunkError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        ChunkDimension::new(value)
    }
}

impl From<ChunkDimension> for u32 {
    fn from(dimension: ChunkDimension) -> Self {
        dimension.0
    }
}

/// A `Dim³` cube of voxels plus its lifecycle bookkeeping.
///
/// # Invariants
/// - `cells.len() == dimension.volume()` at all times
/// - `occupancy[i]` is set exactly when `cells[i]` is not air
#[derive(Clone, Debug)]
pub struct Chunk {
    coordinate: ChunkCoordinate,
    dimension: ChunkDimension,
    cells: Vec<BlockInstance>,
    occupancy: BitVec,
    /// Set on any mutation since the last successful persist.
    dirty: bool,
    /// Set when the contents came from the world generator.
    generated: bool,
    /// Manager tick of the most recent read or write, used to order evictions.
    last_accessed_tick: u64,
    /// Incremented on every mutation; lets an in-flight save detect racing writes.
    revision: u64,
}

impl Chunk {
    /// Creates a new, completely empty chunk (all cells are air).
    pub fn empty(coordinate: ChunkCoordinate, dimension: ChunkDimension) -> Self {
        let volume = dimension.volume();
        Chunk {
            coordinate,
            dimension,
            cells: vec![BlockInstance::AIR; volume],
            occupancy: BitVec::repeat(false, volume),
            dirty: false,
            generated: false,
            last_accessed_tick: 0,
            revision: 0,
        }
    }

    /// Creates a chunk from a full cell buffer in row-major (x, y, z) order.
    ///
    /// # Errors
    /// [`ChunkError::CellCountMismatch`] unless `cells` holds exactly `Dim³` entries.
    pub fn from_cells(
        coordinate: ChunkCoordinate,
        dimension: ChunkDimension,
        cells: Vec<BlockInstance>,
    ) -> Result<Self, ChunkError> {
        if cells.len() != dimension.volume() {
            return Err(ChunkError::CellCountMismatch {
                expected: dimension.volume(),
                found: cells.len(),
            });
        }

        let occupancy = cells.iter().map(|cell| !cell.is_air()).collect();
        Ok(Chunk {
            coordinate,
            dimension,
            cells,
            occupancy,
            dirty: false,
            generated: false,
            last_accessed_tick: 0,
            revision: 0,
        })
    }

    /// Rebuilds a chunk from a snapshot. The result is dirty, because a
    /// snapshot only exists for contents that still need persisting.
    pub fn from_snapshot(snapshot: ChunkSnapshot) -> Self {
        let occupancy = snapshot.cells.iter().map(|cell| !cell.is_air()).collect();
        Chunk {
            coordinate: snapshot.coordinate,
            dimension: snapshot.dimension,
            cells: snapshot.cells,
            occupancy,
            dirty: true,
            generated: snapshot.generated,
            last_accessed_tick: 0,
            revision: snapshot.revision,
        }
    }

    /// The chunk's position in chunk units.
    pub fn coordinate(&self) -> ChunkCoordinate {
        self.coordinate
    }

    /// The chunk's edge length.
    pub fn dimension(&self) -> ChunkDimension {
        self.dimension
    }

    fn index_of(&self, local: Point3<i32>) -> Result<usize, ChunkError> {
        if !self.dimension.contains(local) {
            return Err(ChunkError::OutOfBounds {
                position: local,
                dimension: self.dimension.get(),
            });
        }
        Ok(self.dimension.index_unchecked(local))
    }

    /// Reads the block at a local position.
    ///
    /// # Errors
    /// [`ChunkError::OutOfBounds`] if any component is `< 0` or `>= Dim`.
    pub fn get_block(&self, local: Point3<i32>) -> Result<BlockInstance, ChunkError> {
        let index = self.index_of(local)?;
        Ok(self.cells[index])
    }

    /// Writes the block at a local position and marks the chunk dirty.
    ///
    /// # Returns
    /// The block that previously occupied the cell.
    ///
    /// # Errors
    /// [`ChunkError::OutOfBounds`] if any component is `< 0` or `>= Dim`. The
    /// chunk is left untouched.
    pub fn set_block(
        &mut self,
        local: Point3<i32>,
        block: BlockInstance,
    ) -> Result<BlockInstance, ChunkError> {
        let index = self.index_of(local)?;
        let previous = std::mem::replace(&mut self.cells[index], block);
        self.occupancy.set(index, !block.is_air());
        self.dirty = true;
        self.revision += 1;
        Ok(previous)
    }

    /// Returns `true` if the cell at `local` holds anything but air.
    pub fn is_occupied(&self, local: Point3<i32>) -> Result<bool, ChunkError> {
        let index = self.index_of(local)?;
        Ok(self.occupancy[index])
    }

    /// Lazily enumerates every non-air cell as `(local position, block)` pairs.
    ///
    /// The sequence is finite and can be restarted by calling this again (or
    /// by cloning the iterator).
    pub fn iter_non_empty(&self) -> NonEmptyBlocks<'_> {
        NonEmptyBlocks::new(&self.occupancy, &self.cells, self.dimension)
    }

    /// Number of non-air cells.
    pub fn non_empty_count(&self) -> usize {
        self.occupancy.count_ones()
    }

    /// Returns `true` if every cell is air.
    pub fn is_empty(&self) -> bool {
        self.occupancy.not_any()
    }

    /// Whether the chunk has modifications not yet reflected on disk.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clears the dirty flag after a successful persist.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Whether the contents came from the world generator.
    pub fn is_generated(&self) -> bool {
        self.generated
    }

    pub(crate) fn set_generated(&mut self, generated: bool) {
        self.generated = generated;
    }

    /// Manager tick of the most recent access.
    pub fn last_accessed_tick(&self) -> u64 {
        self.last_accessed_tick
    }

    /// Records an access at the given manager tick.
    pub fn touch(&mut self, tick: u64) {
        self.last_accessed_tick = self.last_accessed_tick.max(tick);
    }

    /// Mutation counter; see [`ChunkSnapshot`].
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Copies the chunk contents for serialization on another thread.
    pub fn snapshot(&self) -> ChunkSnapshot {
        ChunkSnapshot {
            coordinate: self.coordinate,
            dimension: self.dimension,
            cells: self.cells.clone(),
            generated: self.generated,
            revision: self.revision,
        }
    }

    /// Raw bytes of the cell array, for hashing and byte-for-byte comparison.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.cells)
    }

    /// Returns `true` if both chunks hold identical blocks, ignoring bookkeeping.
    pub fn same_blocks(&self, other: &Chunk) -> bool {
        self.coordinate == other.coordinate
            && self.dimension == other.dimension
            && self.cells == other.cells
    }
}

/// An immutable copy of a chunk's contents taken at a given revision.
///
/// Saves serialize snapshots rather than live chunks, so gameplay can keep
/// writing to the chunk while the save runs on a worker thread. Comparing the
/// snapshot revision with the live chunk afterwards tells whether a write
/// raced with the save.
#[derive(Clone, Debug)]
pub struct ChunkSnapshot {
    coordinate: ChunkCoordinate,
    dimension: ChunkDimension,
    cells: Vec<BlockInstance>,
    generated: bool,
    revision: u64,
}

impl ChunkSnapshot {
    /// The chunk's position in chunk units.
    pub fn coordinate(&self) -> ChunkCoordinate {
        self.coordinate
    }

    /// The chunk's edge length.
    pub fn dimension(&self) -> ChunkDimension {
        self.dimension
    }

    /// The revision of the chunk when the snapshot was taken.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// All cells in row-major (x, then y, then z) order.
    pub fn cells(&self) -> &[BlockInstance] {
        &self.cells
    }

    /// Whether the chunk came from the world generator.
    pub fn is_generated(&self) -> bool {
        self.generated
    }
}
