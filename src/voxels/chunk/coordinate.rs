//! # Chunk Coordinates
//!
//! Chunk coordinates identify a chunk in chunk units (not block units) and
//! are the stable key for every chunk lookup. World block positions are
//! converted with floor division so negative coordinates map to the chunk
//! below/behind the origin rather than rounding towards zero.

use std::fmt;

use cgmath::Point3;
use serde::{Deserialize, Serialize};

use super::ChunkDimension;

/// Position of a chunk in chunk units. Hashes and compares by value.
#[derive(
    Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize,
)]
pub struct ChunkCoordinate {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkCoordinate {
    /// Creates a chunk coordinate.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        ChunkCoordinate { x, y, z }
    }

    /// Returns the coordinate of the chunk containing the given world block position.
    pub fn containing(world: Point3<i32>, dimension: ChunkDimension) -> Self {
        let edge = dimension.edge();
        ChunkCoordinate {
            x: world.x.div_euclid(edge),
            y: world.y.div_euclid(edge),
            z: world.z.div_euclid(edge),
        }
    }

    /// World block position of this chunk's local `(0, 0, 0)` cell.
    pub fn origin(&self, dimension: ChunkDimension) -> Point3<i32> {
        let edge = dimension.edge();
        Point3::new(self.x * edge, self.y * edge, self.z * edge)
    }

    /// Returns this coordinate shifted by the given number of chunks.
    pub fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        ChunkCoordinate::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Squared euclidean distance to another chunk, in chunk units.
    pub fn distance_squared(&self, other: &ChunkCoordinate) -> i64 {
        let dx = self.x as i64 - other.x as i64;
        let dy = self.y as i64 - other.y as i64;
        let dz = self.z as i64 - other.z as i64;
        dx * dx + dy * dy + dz * dz
    }
}

/// Local (in-chunk) position of a world block position.
pub fn local_position(world: Point3<i32>, dimension: ChunkDimension) -> Point3<i32> {
    let edge = dimension.edge();
    Point3::new(
        world.x.rem_euclid(edge),
        world.y.rem_euclid(edge),
        world.z.rem_euclid(edge),
    )
}

impl From<Point3<i32>> for ChunkCoordinate {
    fn from(point: Point3<i32>) -> Self {
        ChunkCoordinate::new(point.x, point.y, point.z)
    }
}

impl From<ChunkCoordinate> for Point3<i32> {
    fn from(coordinate: ChunkCoordinate) -> Self {
        Point3::new(coordinate.x, coordinate.y, coordinate.z)
    }
}

impl fmt::Display for ChunkCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dim16() -> ChunkDimension {
        ChunkDimension::new(16).unwrap()
    }

    #[test]
    fn negative_positions_floor_to_the_lower_chunk() {
        let coordinate = ChunkCoordinate::containing(Point3::new(-1, -16, -17), dim16());
        assert_eq!(coordinate, ChunkCoordinate::new(-1, -1, -2));
        assert_eq!(
            local_position(Point3::new(-1, -16, -17), dim16()),
            Point3::new(15, 0, 15)
        );
    }

    #[test]
    fn origin_and_local_recompose_world_position() {
        let world = Point3::new(37, -5, 1024);
        let coordinate = ChunkCoordinate::containing(world, dim16());
        let origin = coordinate.origin(dim16());
        let local = local_position(world, dim16());
        assert_eq!(
            Point3::new(origin.x + local.x, origin.y + local.y, origin.z + local.z),
            world
        );
    }

    #[test]
    fn distance_is_symmetric() {
        let a = ChunkCoordinate::new(1, 2, 3);
        let b = ChunkCoordinate::new(-2, 2, 7);
        assert_eq!(a.distance_squared(&b), 25);
        assert_eq!(b.distance_squared(&a), 25);
    }
}
