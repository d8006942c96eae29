#![allow(dead_code)]

use std::{fs, path::PathBuf};

use voxel_world::{voxels::chunk::ChunkDimension, WorldConfig};

/// A scratch save root, removed when dropped.
pub struct TempDir(pub PathBuf);

impl TempDir {
    pub fn new(label: &str) -> Self {
        let path = std::env::temp_dir().join(format!("voxel-world-{label}-{}", fastrand::u64(..)));
        TempDir(path)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

/// A small world rooted in `root` that runs every task inline.
pub fn config(root: &TempDir, seed: u64) -> WorldConfig {
    WorldConfig {
        world_name: String::from("test"),
        seed,
        chunk_dimension: ChunkDimension::new(16).unwrap(),
        active_radius: 1,
        worker_count: 0,
        save_root: root.0.clone(),
        ..WorldConfig::default()
    }
}
