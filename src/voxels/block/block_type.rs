//! # Block Type Module
//!
//! This module defines the static catalog entry describing one kind of block.
//! Block types are created once when the registry is populated and are never
//! mutated afterwards; chunks only ever store the numeric [`BlockId`].

use serde::{Deserialize, Serialize};

use super::BlockId;

/// Static properties of a block type.
///
/// Block types are referenced by id everywhere outside the registry. The
/// flags describe how downstream consumers (meshing, physics) should treat
/// the block; the world core itself only inspects `supports_metadata`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockType {
    /// Stable numeric identifier, unique within a registry. `0` is air.
    pub id: BlockId,

    /// Display name, unique within a registry.
    pub name: String,

    /// Whether the block occupies its cell for collision purposes.
    #[serde(default = "default_true")]
    pub solid: bool,

    /// Whether the block fully hides the faces behind it.
    #[serde(default = "default_true")]
    pub opaque: bool,

    /// Whether the block behaves as a fluid.
    #[serde(default)]
    pub liquid: bool,

    /// Whether instances of this block may carry non-zero metadata
    /// (orientation, damage stage, ...).
    #[serde(default)]
    pub supports_metadata: bool,

    /// Relative weight for placement rules choosing between candidate blocks.
    /// The built-in terrain palette is fixed and does not consult it.
    #[serde(default = "default_weight")]
    pub generation_weight: f32,

    /// Time needed to break the block.
    #[serde(default = "default_durability")]
    pub durability: f32,

    /// Whether gameplay is allowed to destroy the block at all.
    #[serde(default = "default_true")]
    pub destructible: bool,
}

fn default_true() -> bool {
    true
}

fn default_weight() -> f32 {
    1.0
}

fn default_durability() -> f32 {
    100.0
}

impl BlockType {
    /// Creates a solid, opaque, destructible block type with default weights.
    ///
    /// # Arguments
    /// * `id` - The id of the new block type
    /// * `name` - The display name of the new block type
    pub fn new(id: BlockId, name: impl Into<String>) -> Self {
        BlockType {
            id,
            name: name.into(),
            solid: true,
            opaque: true,
            liquid: false,
            supports_metadata: false,
            generation_weight: default_weight(),
            durability: default_durability(),
            destructible: true,
        }
    }

    /// The empty block. Always registered under [`BlockId::AIR`].
    pub fn air() -> Self {
        BlockType {
            solid: false,
            opaque: false,
            generation_weight: 0.0,
            durability: 0.0,
            destructible: false,
            ..BlockType::new(BlockId::AIR, "air")
        }
    }

    /// Returns a copy of this type with the given flags.
    pub fn with_flags(mut self, solid: bool, opaque: bool, liquid: bool) -> Self {
        self.solid = solid;
        self.opaque = opaque;
        self.liquid = liquid;
        self
    }

    /// Returns a copy of this type that accepts block metadata.
    pub fn with_metadata_support(mut self) -> Self {
        self.supports_metadata = true;
        self
    }

    /// Returns `true` if this is the air block.
    pub fn is_air(&self) -> bool {
        self.id == BlockId::AIR
    }
}
