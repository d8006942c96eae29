//! # Chunk Iteration Module
//!
//! This module provides an iterator over all non-air blocks in a chunk.
//!
//! The iterator walks the chunk's occupancy bit vector and only touches the
//! dense cell array at set bits, so runs of air are skipped a machine word at
//! a time. It yields logical `(local position, block)` pairs and never exposes
//! the storage layout, which leaves the chunk free to change how it stores
//! cells.

use bitvec::{order::Lsb0, slice::BitSlice, slice::IterOnes};
use cgmath::Point3;

use crate::voxels::block::BlockInstance;

use super::ChunkDimension;

/// An iterator over all non-air blocks in a chunk, in row-major order.
///
/// A clone continues from the same point as the original. Call
/// [`super::Chunk::iter_non_empty`] again to start over.
#[derive(Clone)]
pub struct NonEmptyBlocks<'a> {
    /// Indices of occupied cells
    ones: IterOnes<'a, usize, Lsb0>,
    /// Cell storage of the chunk being iterated over
    cells: &'a [BlockInstance],
    dimension: ChunkDimension,
}

impl<'a> NonEmptyBlocks<'a> {
    pub(super) fn new(
        occupancy: &'a BitSlice<usize, Lsb0>,
        cells: &'a [BlockInstance],
        dimension: ChunkDimension,
    ) -> Self {
        NonEmptyBlocks {
            ones: occupancy.iter_ones(),
            cells,
            dimension,
        }
    }
}

impl Iterator for NonEmptyBlocks<'_> {
    type Item = (Point3<i32>, BlockInstance);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.ones.next()?;
        Some((self.dimension.position_of(index), self.cells[index]))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ones.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use crate::voxels::{
        block::{BlockId, BlockInstance},
        chunk::{Chunk, ChunkCoordinate, ChunkDimension},
    };
    use cgmath::Point3;

    #[test]
    fn yields_only_non_air_cells_in_row_major_order() {
        let mut chunk = Chunk::empty(ChunkCoordinate::default(), ChunkDimension::new(4).unwrap());
        let placed = [
            (Point3::new(3, 3, 3), BlockId::STONE),
            (Point3::new(0, 0, 0), BlockId::GRASS),
            (Point3::new(1, 2, 0), BlockId::DIRT),
        ];
        for (local, id) in placed {
            chunk.set_block(local, BlockInstance::new(id)).unwrap();
        }

        let found: Vec<_> = chunk.iter_non_empty().collect();
        assert_eq!(
            found,
            vec![
                (Point3::new(0, 0, 0), BlockInstance::new(BlockId::GRASS)),
                (Point3::new(1, 2, 0), BlockInstance::new(BlockId::DIRT)),
                (Point3::new(3, 3, 3), BlockInstance::new(BlockId::STONE)),
            ]
        );
    }

    #[test]
    fn iteration_is_restartable() {
        let mut chunk = Chunk::empty(ChunkCoordinate::default(), ChunkDimension::new(8).unwrap());
        chunk
            .set_block(Point3::new(5, 6, 7), BlockInstance::with_metadata(BlockId::LOG, 2))
            .unwrap();

        let first: Vec<_> = chunk.iter_non_empty().collect();
        let second: Vec<_> = chunk.iter_non_empty().collect();
        assert_eq!(first, second);
        assert_eq!(first[0].1.metadata, 2);
    }
}
