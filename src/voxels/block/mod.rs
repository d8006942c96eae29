//! # Block Module
//!
//! This module provides the block catalog and the per-voxel block state.
//!
//! * [`BlockType`] - immutable catalog entry (flags, weights, durability)
//! * [`BlockRegistry`] - the catalog itself, populated once at startup
//! * [`BlockInstance`] - the compact state stored in every chunk cell

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod block_type;
pub mod error;
pub mod registry;

pub use block_type::BlockType;
pub use error::RegistryError;
pub use registry::BlockRegistry;

/// Numeric identifier of a block type.
///
/// Stored as a `u16` so that a [`BlockInstance`] stays four bytes wide.
#[repr(transparent)]
#[derive(
    Copy,
    Clone,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Debug,
    Serialize,
    Deserialize,
    bytemuck::Pod,
    bytemuck::Zeroable,
)]
#[serde(transparent)]
pub struct BlockId(pub u16);

impl BlockId {
    /// Air, the empty block. Reserved; always present in a registry.
    pub const AIR: BlockId = BlockId(0);
    /// Top layer of temperate columns.
    pub const GRASS: BlockId = BlockId(1);
    /// Indestructible world floor.
    pub const BEDROCK: BlockId = BlockId(2);
    /// Deep fill.
    pub const STONE: BlockId = BlockId(3);
    /// Surface and near-surface layers of the sand biome.
    pub const SAND: BlockId = BlockId(4);
    /// Liquid; not placed by the terrain generator.
    pub const WATER: BlockId = BlockId(5);
    /// Oriented block; the only default type that carries metadata.
    pub const LOG: BlockId = BlockId(6);
    /// Layers directly beneath the surface block.
    pub const DIRT: BlockId = BlockId(7);
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The state of a single voxel.
///
/// A block instance references its type by id and carries a small metadata
/// word. Metadata is only meaningful (and only accepted by the chunk manager)
/// for block types that declare `supports_metadata`.
///
/// # Memory Layout
/// The `#[repr(C)]` attribute keeps the layout stable so chunk contents can be
/// viewed as raw bytes for hashing and byte-for-byte comparison.
#[repr(C)]
#[derive(
    Copy, Clone, Default, PartialEq, Eq, Hash, Debug, bytemuck::Pod, bytemuck::Zeroable,
)]
pub struct BlockInstance {
    /// The type of this block.
    pub id: BlockId,
    /// Type-specific compact state (orientation, damage, ...).
    pub metadata: u16,
}

impl BlockInstance {
    /// The empty voxel.
    pub const AIR: BlockInstance = BlockInstance {
        id: BlockId::AIR,
        metadata: 0,
    };

    /// Creates a block instance of the given type without metadata.
    pub const fn new(id: BlockId) -> Self {
        BlockInstance { id, metadata: 0 }
    }

    /// Creates a block instance carrying metadata.
    pub const fn with_metadata(id: BlockId, metadata: u16) -> Self {
        BlockInstance { id, metadata }
    }

    /// Returns `true` if this voxel is air.
    pub fn is_air(&self) -> bool {
        self.id == BlockId::AIR
    }
}

impl From<BlockId> for BlockInstance {
    fn from(id: BlockId) -> Self {
        BlockInstance::new(id)
    }
}
