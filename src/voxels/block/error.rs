use std::path::PathBuf;

use super::BlockId;

/// Errors produced while populating or querying the block registry.
#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    /// A block type with this id was already registered.
    #[error("Block id {0} is already registered")]
    DuplicateId(BlockId),
    /// A block type with this name was already registered.
    #[error("Block name '{0}' is already registered")]
    DuplicateName(String),
    /// No block type is registered under this id.
    #[error("Unknown block id {0}")]
    UnknownBlock(BlockId),
    /// No block type is registered under this name.
    #[error("Unknown block name '{0}'")]
    UnknownName(String),
    /// The block catalog document could not be parsed.
    #[error("Invalid block catalog: {0}")]
    InvalidCatalog(#[from] serde_json::Error),
    /// The block catalog file could not be read.
    #[error("Failed to read block catalog {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
