#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel World
//!
//! The data and streaming core of a chunked voxel world: block catalog,
//! chunk storage, deterministic terrain generation, on-disk persistence and
//! the chunk manager that keeps the region around a moving player resident.
//!
//! ## Key Modules
//!
//! * `voxels` - Blocks, chunks, generation, persistence and the chunk manager
//! * `task_management` - The worker pool chunk loads and saves run on
//! * `config` - World configuration documents
//! * `world` - [`VoxelWorld`], the handle that ties one world together
//!
//! ## Usage
//!
//! ```no_run
//! use cgmath::{Point3, Vector3};
//! use voxel_world::{config::WorldConfig, VoxelWorld};
//!
//! let config = WorldConfig {
//!     seed: 42,
//!     ..WorldConfig::default()
//! };
//! let mut world = VoxelWorld::open(config)?;
//! world.update_player(Point3::new(0.0, 40.0, 0.0), Vector3::new(0.0, 0.0, 0.0))?;
//! let block = world.get_block(Point3::new(5, 10, 5))?;
//! println!("{block:?}");
//! world.shutdown()?;
//! # Ok::<(), voxel_world::WorldError>(())
//! ```
//!
//! ## Rendering
//!
//! Rendering and meshing are not part of this crate. The chunk manager
//! publishes [`voxels::manager::ChunkEvent`]s that a renderer can subscribe to.

use cgmath::Point3;
use log::info;

pub mod config;
pub mod task_management;
pub mod voxels;
pub mod world;

pub use config::WorldConfig;
pub use world::{VoxelWorld, WorldError};

use voxels::block::{BlockId, BlockInstance};

/// Ticks the demo walk lasts.
const DEMO_TICKS: u32 = 64;
/// Blocks the demo player moves along +x per tick.
const DEMO_STEP: f32 = 4.0;
/// Ticks between background flushes in the demo.
const DEMO_FLUSH_INTERVAL: u32 = 16;

/// Initializes logging to stdout, filtered by `RUST_LOG`.
/// Later calls are ignored.
pub fn init_logging() {
    let mut log_builder = env_logger::Builder::new();
    let _ = log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .try_init();
}

/// Opens the world described by the configuration file named on the command
/// line (or the default configuration), walks a player across it while
/// editing blocks, and shuts it down again.
///
/// # Errors
/// Anything [`VoxelWorld::open`], [`VoxelWorld::update_player`] or the block
/// accessors report.
pub fn run() -> Result<(), WorldError> {
    init_logging();
    info!("Logger initialized");

    let config = match std::env::args().nth(1) {
        Some(path) => WorldConfig::load_from_file(path)?,
        None => WorldConfig::default(),
    };
    let seed = config.seed;
    let mut world = VoxelWorld::open(config)?;
    let mut rng = fastrand::Rng::with_seed(seed);

    let start = world.meta().player_location;
    let rotation = world.meta().player_rotation;
    let edits = [BlockId::STONE, BlockId::DIRT, BlockId::SAND, BlockId::AIR];

    for tick in 0..DEMO_TICKS {
        let location = Point3::new(start.x + tick as f32 * DEMO_STEP, start.y, start.z);
        let update = world.update_player(location, rotation)?;
        let applied = world.manager_mut().process_completed();
        if !update.evicted.is_empty() || !update.requested.is_empty() {
            info!(
                "Tick {tick}: {} requested, {} evicted, {} restored, {applied} results applied",
                update.requested.len(),
                update.evicted.len(),
                update.restored.len()
            );
        }

        let x = location.x.floor() as i32 + rng.i32(-8..=8);
        let z = location.z.floor() as i32 + rng.i32(-8..=8);
        let y = world.generator().surface_height(x, z);
        let block = BlockInstance::new(edits[rng.usize(..edits.len())]);
        world.set_block(Point3::new(x, y, z), block)?;

        if tick % DEMO_FLUSH_INTERVAL == DEMO_FLUSH_INTERVAL - 1 {
            let issued = world.manager_mut().flush_dirty()?;
            info!("Tick {tick}: flushing {issued} dirty chunks");
        }
    }

    world.manager_mut().wait_until_idle();
    let stats = world.manager().stats();
    let report = world.shutdown()?;
    info!("Session stats: {stats:?}");
    info!(
        "Shutdown saved {} chunks, {} lost",
        report.saved,
        report.failed.len()
    );
    Ok(())
}
