//! # Chunk Creation Module
//!
//! This module provides a builder that fills a chunk cell by cell in storage
//! order. It keeps the cell array and the occupancy bits consistent while
//! blocks are pushed, and tracks the local position the next push will write
//! so the terrain generator can compute each block from its position without
//! doing index arithmetic itself.

use bitvec::vec::BitVec;
use cgmath::Point3;

use crate::voxels::block::BlockInstance;

use super::{Chunk, ChunkCoordinate, ChunkDimension, ChunkError};

/// A builder for populating a chunk in row-major (x, then y, then z) order.
pub struct ChunkBuilder {
    /// The position of the chunk being created
    coordinate: ChunkCoordinate,
    dimension: ChunkDimension,
    cells: Vec<BlockInstance>,
    /// Bit vector where each bit represents whether a cell holds a non-air block
    occupancy: BitVec,
    /// Local position of the next cell to be pushed
    local_x: i32,
    local_y: i32,
    local_z: i32,
}

impl ChunkBuilder {
    /// Creates a builder for a chunk at the given position.
    pub fn new(coordinate: ChunkCoordinate, dimension: ChunkDimension) -> Self {
        let volume = dimension.volume();
        ChunkBuilder {
            coordinate,
            dimension,
            cells: Vec::with_capacity(volume),
            occupancy: BitVec::with_capacity(volume),
            local_x: 0,
            local_y: 0,
            local_z: 0,
        }
    }

    /// The local position the next [`ChunkBuilder::push_block`] will fill, or
    /// `None` once the chunk is full.
    pub fn next_position(&self) -> Option<Point3<i32>> {
        if self.is_full() {
            None
        } else {
            Some(Point3::new(self.local_x, self.local_y, self.local_z))
        }
    }

    /// Returns `true` once all `Dim³` cells have been pushed.
    pub fn is_full(&self) -> bool {
        self.cells.len() == self.dimension.volume()
    }

    /// Adds a block at the current position and advances the position.
    ///
    /// # Errors
    /// [`ChunkError::CellCountMismatch`] if the chunk is already full.
    pub fn push_block(&mut self, block: BlockInstance) -> Result<(), ChunkError> {
        self.push_run(block, 1)
    }

    /// Adds `count` copies of a block starting at the current position.
    ///
    /// # Errors
    /// [`ChunkError::CellCountMismatch`] if the run would overflow the chunk;
    /// nothing is pushed in that case.
    pub fn push_run(&mut self, block: BlockInstance, count: usize) -> Result<(), ChunkError> {
        let volume = self.dimension.volume();
        if self.cells.len() + count > volume {
            return Err(ChunkError::CellCountMismatch {
                expected: volume,
                found: self.cells.len() + count,
            });
        }

        let is_occupied = !block.is_air();
        self.cells.extend(std::iter::repeat(block).take(count));
        self.occupancy
            .extend(std::iter::repeat(is_occupied).take(count));

        let edge = self.dimension.edge();
        for _ in 0..count {
            self.local_x += 1;
            if self.local_x == edge {
                self.local_x = 0;
                self.local_y += 1;
                if self.local_y == edge {
                    self.local_y = 0;
                    self.local_z += 1;
                }
            }
        }
        Ok(())
    }

    /// Finalizes the chunk.
    ///
    /// # Errors
    /// [`ChunkError::CellCountMismatch`] if fewer than `Dim³` cells were pushed.
    pub fn return_chunk(self) -> Result<Chunk, ChunkError> {
        if !self.is_full() {
            return Err(ChunkError::CellCountMismatch {
                expected: self.dimension.volume(),
                found: self.cells.len(),
            });
        }
        debug_assert_eq!(self.occupancy.len(), self.cells.len());
        Ok(Chunk {
            coordinate: self.coordinate,
            dimension: self.dimension,
            cells: self.cells,
            occupancy: self.occupancy,
            dirty: false,
            generated: false,
            last_accessed_tick: 0,
            revision: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxels::block::BlockId;

    #[test]
    fn positions_advance_x_then_y_then_z() {
        let mut builder =
            ChunkBuilder::new(ChunkCoordinate::default(), ChunkDimension::new(2).unwrap());
        let mut visited = Vec::new();
        while let Some(position) = builder.next_position() {
            visited.push(position);
            builder.push_block(BlockInstance::AIR).unwrap();
        }
        assert_eq!(
            visited,
            vec![
                Point3::new(0, 0, 0),
                Point3::new(1, 0, 0),
                Point3::new(0, 1, 0),
                Point3::new(1, 1, 0),
                Point3::new(0, 0, 1),
                Point3::new(1, 0, 1),
                Point3::new(0, 1, 1),
                Point3::new(1, 1, 1),
            ]
        );
        assert!(builder.return_chunk().unwrap().is_empty());
    }

    #[test]
    fn builder_matches_direct_writes() {
        let dimension = ChunkDimension::new(4).unwrap();
        let mut builder = ChunkBuilder::new(ChunkCoordinate::default(), dimension);
        builder.push_run(BlockInstance::new(BlockId::STONE), 16).unwrap();
        builder.push_run(BlockInstance::AIR, 48).unwrap();
        let built = builder.return_chunk().unwrap();

        let mut direct = Chunk::empty(ChunkCoordinate::default(), dimension);
        for x in 0..4 {
            for y in 0..4 {
                direct
                    .set_block(Point3::new(x, y, 0), BlockInstance::new(BlockId::STONE))
                    .unwrap();
            }
        }
        assert!(built.same_blocks(&direct));
        assert!(!built.is_dirty());
    }

    #[test]
    fn incomplete_or_overfull_builders_fail() {
        let dimension = ChunkDimension::new(2).unwrap();
        let mut builder = ChunkBuilder::new(ChunkCoordinate::default(), dimension);
        builder.push_run(BlockInstance::AIR, 7).unwrap();
        assert!(builder.push_run(BlockInstance::AIR, 2).is_err());
        assert!(matches!(
            builder.return_chunk(),
            Err(ChunkError::CellCountMismatch { expected: 8, found: 7 })
        ));
    }
}
