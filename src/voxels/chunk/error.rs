use cgmath::Point3;

/// Errors produced by chunk storage access.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    /// A local coordinate was outside `[0, dimension)` on some axis.
    /// Local coordinates are rejected, never clamped.
    #[error("Local position {position:?} is outside a chunk of dimension {dimension}")]
    OutOfBounds {
        position: Point3<i32>,
        dimension: u32,
    },
    /// A cell buffer did not hold exactly `dimension³` cells.
    #[error("Expected {expected} cells, found {found}")]
    CellCountMismatch { expected: usize, found: usize },
    /// The chunk edge length is not a supported power of two.
    #[error(
        "Chunk dimension {0} must be a power of two between {min} and {max}",
        min = super::ChunkDimension::MIN,
        max = super::ChunkDimension::MAX
    )]
    InvalidDimension(u32),
}
