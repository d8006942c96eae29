//! # Block Registry
//!
//! The registry is the catalog of every block type known to a world. It is
//! populated once, before any chunk is generated or loaded, and is read-only
//! afterwards. Because it has no interior mutability it can be shared between
//! worker threads behind an `Arc` without any locking.
//!
//! ## Catalog Format
//!
//! Catalogs are JSON documents holding a list of [`BlockType`] entries. Every
//! field except `id` and `name` is optional:
//!
//! ```json
//! { "blocks": [ { "id": 3, "name": "stone", "durability": 150.0 } ] }
//! ```
//!
//! Air (id `0`) is registered implicitly and must not appear in a catalog.

use std::{collections::HashMap, fs, path::Path};

use serde::Deserialize;

use super::{BlockId, BlockType, RegistryError};

/// The catalog bundled with the crate.
const DEFAULT_CATALOG: &str = include_str!("default_blocks.json");

#[derive(Deserialize)]
struct Catalog {
    blocks: Vec<BlockType>,
}

/// Catalog of block types, indexed by id and by name.
#[derive(Debug, Clone)]
pub struct BlockRegistry {
    by_id: HashMap<BlockId, BlockType>,
    by_name: HashMap<String, BlockId>,
}

impl BlockRegistry {
    /// Creates a registry containing only air.
    pub fn new() -> Self {
        let air = BlockType::air();
        let mut by_name = HashMap::new();
        by_name.insert(air.name.clone(), air.id);
        let mut by_id = HashMap::new();
        by_id.insert(air.id, air);

        BlockRegistry { by_id, by_name }
    }

    /// Creates a registry populated with the bundled default catalog.
    pub fn with_defaults() -> Result<Self, RegistryError> {
        Self::from_json_str(DEFAULT_CATALOG)
    }

    /// Creates a registry from a JSON catalog document.
    ///
    /// # Errors
    /// * [`RegistryError::InvalidCatalog`] if the document does not parse
    /// * [`RegistryError::DuplicateId`] / [`RegistryError::DuplicateName`] if
    ///   two entries collide (or an entry collides with air)
    pub fn from_json_str(catalog: &str) -> Result<Self, RegistryError> {
        let catalog: Catalog = serde_json::from_str(catalog)?;
        let mut registry = BlockRegistry::new();
        for block_type in catalog.blocks {
            registry.register(block_type)?;
        }
        log::debug!("Block registry populated with {} types", registry.len());
        Ok(registry)
    }

    /// Reads a JSON catalog from disk. See [`BlockRegistry::from_json_str`].
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Adds a block type to the catalog.
    ///
    /// # Errors
    /// Fails with [`RegistryError::DuplicateId`] if the id is taken and with
    /// [`RegistryError::DuplicateName`] if the name is taken. The registry is
    /// left unchanged on failure.
    pub fn register(&mut self, block_type: BlockType) -> Result<(), RegistryError> {
        if self.by_id.contains_key(&block_type.id) {
            return Err(RegistryError::DuplicateId(block_type.id));
        }
        if self.by_name.contains_key(&block_type.name) {
            return Err(RegistryError::DuplicateName(block_type.name));
        }

        log::trace!("Registered block {} '{}'", block_type.id, block_type.name);
        self.by_name.insert(block_type.name.clone(), block_type.id);
        self.by_id.insert(block_type.id, block_type);
        Ok(())
    }

    /// Looks up a block type by id.
    ///
    /// # Errors
    /// [`RegistryError::UnknownBlock`] if no such id is registered.
    pub fn lookup(&self, id: BlockId) -> Result<&BlockType, RegistryError> {
        self.by_id.get(&id).ok_or(RegistryError::UnknownBlock(id))
    }

    /// Looks up a block type by its display name.
    pub fn lookup_by_name(&self, name: &str) -> Result<&BlockType, RegistryError> {
        self.by_name
            .get(name)
            .and_then(|id| self.by_id.get(id))
            .ok_or_else(|| RegistryError::UnknownName(name.to_string()))
    }

    /// Returns `true` if a block type with this id is registered.
    pub fn contains(&self, id: BlockId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Number of registered block types, air included.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// A registry always contains air, so it is never empty.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Iterates over all registered block types in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &BlockType> {
        let mut types: Vec<&BlockType> = self.by_id.values().collect();
        types.sort_by_key(|block_type| block_type.id);
        types.into_iter()
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_registry_contains_only_air() {
        let registry = BlockRegistry::new();
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup(BlockId::AIR).unwrap().is_air());
        assert!(!registry.lookup(BlockId::AIR).unwrap().solid);
    }

    #[test]
    fn default_catalog_has_generator_blocks() {
        let registry = BlockRegistry::with_defaults().unwrap();
        for id in [
            BlockId::GRASS,
            BlockId::BEDROCK,
            BlockId::STONE,
            BlockId::SAND,
            BlockId::DIRT,
        ] {
            assert!(registry.contains(id), "missing {id}");
        }
        assert!(registry.lookup(BlockId::WATER).unwrap().liquid);
        assert!(registry.lookup(BlockId::LOG).unwrap().supports_metadata);
        assert!(!registry.lookup(BlockId::BEDROCK).unwrap().destructible);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut registry = BlockRegistry::new();
        registry.register(BlockType::new(BlockId(9), "marble")).unwrap();
        let err = registry
            .register(BlockType::new(BlockId(9), "granite"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateId(BlockId(9))));
        assert!(registry.lookup_by_name("granite").is_err());
    }

    #[test]
    fn air_cannot_be_registered_twice() {
        let mut registry = BlockRegistry::new();
        let err = registry.register(BlockType::air()).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateId(BlockId::AIR)));
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut registry = BlockRegistry::new();
        registry.register(BlockType::new(BlockId(9), "marble")).unwrap();
        let err = registry
            .register(BlockType::new(BlockId(10), "marble"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName(name) if name == "marble"));
    }

    #[test]
    fn unknown_lookups_fail() {
        let registry = BlockRegistry::new();
        assert!(matches!(
            registry.lookup(BlockId(42)),
            Err(RegistryError::UnknownBlock(BlockId(42)))
        ));
        assert!(matches!(
            registry.lookup_by_name("obsidian"),
            Err(RegistryError::UnknownName(_))
        ));
    }

    #[test]
    fn catalog_fields_are_optional() {
        let catalog = r#"{ "blocks": [ { "id": 12, "name": "glass", "opaque": false } ] }"#;
        let registry = BlockRegistry::from_json_str(catalog).unwrap();
        let glass = registry.lookup_by_name("glass").unwrap();
        assert_eq!(glass.id, BlockId(12));
        assert!(glass.solid);
        assert!(!glass.opaque);
        assert!(glass.destructible);
    }

    #[test]
    fn malformed_catalog_is_rejected() {
        assert!(matches!(
            BlockRegistry::from_json_str("{ \"blocks\": 3 }"),
            Err(RegistryError::InvalidCatalog(_))
        ));
    }

    #[test]
    fn iteration_is_ordered_by_id() {
        let registry = BlockRegistry::with_defaults().unwrap();
        let ids: Vec<u16> = registry.iter().map(|block_type| block_type.id.0).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert_eq!(ids.first(), Some(&0));
    }
}
