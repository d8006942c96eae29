//! On-disk layout of a saved world and its chunk file names.

use std::path::{Path, PathBuf};

use crate::voxels::chunk::ChunkCoordinate;

const META_FILE_NAME: &str = "world_meta.json";
const CHUNKS_DIR_NAME: &str = "chunks";
const CHUNK_FILE_PREFIX: &str = "chunk_";
const CHUNK_FILE_EXTENSION: &str = "json";

/// Where a world's files live on disk.
///
/// ```text
/// <save_root>/<world_name>/world_meta.json
/// <save_root>/<world_name>/chunks/chunk_<x>_<y>_<z>.json
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveLayout {
    world_dir: PathBuf,
}

impl SaveLayout {
    pub fn new(save_root: impl AsRef<Path>, world_name: &str) -> Self {
        SaveLayout {
            world_dir: save_root.as_ref().join(world_name),
        }
    }

    pub fn world_dir(&self) -> &Path {
        &self.world_dir
    }

    pub fn meta_path(&self) -> PathBuf {
        self.world_dir.join(META_FILE_NAME)
    }

    pub fn chunks_dir(&self) -> PathBuf {
        self.world_dir.join(CHUNKS_DIR_NAME)
    }

    pub fn chunk_path(&self, coordinate: ChunkCoordinate) -> PathBuf {
        self.chunks_dir().join(format!(
            "{CHUNK_FILE_PREFIX}{}_{}_{}.{CHUNK_FILE_EXTENSION}",
            coordinate.x, coordinate.y, coordinate.z
        ))
    }

    /// Returns `true` if the world has been saved at least once.
    pub fn world_exists(&self) -> bool {
        self.meta_path().is_file()
    }
}

/// Recovers the chunk coordinate from a chunk file name.
pub fn parse_chunk_file_name(file_name: &str) -> Option<ChunkCoordinate> {
    let stem = file_name
        .strip_prefix(CHUNK_FILE_PREFIX)?
        .strip_suffix(CHUNK_FILE_EXTENSION)?
        .strip_suffix('.')?;
    let mut parts = stem.split('_').map(str::parse::<i32>);
    let x = parts.next()?.ok()?;
    let y = parts.next()?.ok()?;
    let z = parts.next()?.ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(ChunkCoordinate::new(x, y, z))
}

/// Path an in-progress write goes to before it is renamed over `path`.
pub(crate) fn temporary_path(path: &Path) -> PathBuf {
    let mut file_name = path.file_name().map(|name| name.to_os_string()).unwrap_or_default();
    file_name.push(".tmp");
    path.with_file_name(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_paths_round_trip_through_file_names() {
        let layout = SaveLayout::new("saves", "alpha");
        for coordinate in [
            ChunkCoordinate::new(0, 0, 0),
            ChunkCoordinate::new(-4, 2, 17),
            ChunkCoordinate::new(i32::MIN, -1, i32::MAX),
        ] {
            let path = layout.chunk_path(coordinate);
            assert!(path.starts_with(Path::new("saves").join("alpha").join("chunks")));
            let name = path.file_name().unwrap().to_str().unwrap();
            assert_eq!(parse_chunk_file_name(name), Some(coordinate));
        }
    }

    #[test]
    fn foreign_file_names_are_ignored() {
        for name in [
            "world_meta.json",
            "chunk_1_2.json",
            "chunk_1_2_3_4.json",
            "chunk_a_2_3.json",
            "chunk_1_2_3.json.tmp",
            "chunk_1_2_3json",
        ] {
            assert_eq!(parse_chunk_file_name(name), None, "{name}");
        }
    }

    #[test]
    fn temporary_path_sits_next_to_target() {
        let target = Path::new("saves/alpha/chunks/chunk_0_0_0.json");
        assert_eq!(
            temporary_path(target),
            Path::new("saves/alpha/chunks/chunk_0_0_0.json.tmp")
        );
    }
}
