use std::sync::{Arc, Mutex};

use cgmath::{Point3, Vector3};
use voxel_world::{
    voxels::{
        block::{BlockId, BlockInstance, BlockRegistry},
        chunk::ChunkCoordinate,
        generation::WorldGenerator,
        manager::{ChunkEvent, ChunkManager, ChunkSource, ChunkState, ManagerError, ManagerSettings},
        persistence::ChunkPersistence,
    },
    VoxelWorld, WorldError,
};

mod common;
use common::{config, TempDir};

fn no_rotation() -> Vector3<f32> {
    Vector3::new(0.0, 0.0, 0.0)
}

#[test]
fn written_blocks_survive_leaving_and_returning() {
    let root = TempDir::new("return");
    let mut world = VoxelWorld::open(config(&root, 42)).unwrap();
    let position = Point3::new(5, 10, 5);

    world.update_player(Point3::new(0.0, 0.0, 0.0), no_rotation()).unwrap();
    world
        .set_block(position, BlockInstance::new(BlockId::STONE))
        .unwrap();

    let update = world
        .update_player(Point3::new(160.0, 0.0, 0.0), no_rotation())
        .unwrap();
    assert!(update.evicted.contains(&ChunkCoordinate::new(0, 0, 0)));
    world.manager_mut().process_completed();
    assert_eq!(world.manager().state_of(ChunkCoordinate::new(0, 0, 0)), ChunkState::Unloaded);
    assert!(world.persistence().exists(ChunkCoordinate::new(0, 0, 0)));

    world.update_player(Point3::new(0.0, 0.0, 0.0), no_rotation()).unwrap();
    assert_eq!(world.get_block(position).unwrap().id, BlockId::STONE);
    assert!(world.manager().stats().loaded >= 1);
}

#[test]
fn written_blocks_survive_a_restart() {
    let root = TempDir::new("restart");
    let log = BlockInstance::with_metadata(BlockId::LOG, 2);
    {
        let mut world = VoxelWorld::open(config(&root, 7)).unwrap();
        world.set_block(Point3::new(-3, 40, 17), log).unwrap();
        let report = world.shutdown().unwrap();
        assert_eq!(report.saved, 1);
        assert!(report.failed.is_empty());
    }

    let mut world = VoxelWorld::open(config(&root, 7)).unwrap();
    assert_eq!(world.meta().chunks, vec![ChunkCoordinate::new(-1, 2, 1)]);
    assert_eq!(world.get_block(Point3::new(-3, 40, 17)).unwrap(), log);
}

#[test]
fn generation_is_deterministic_across_worlds() {
    let first_root = TempDir::new("determinism-a");
    let second_root = TempDir::new("determinism-b");
    let mut first = VoxelWorld::open(config(&first_root, 42)).unwrap();
    let mut second = VoxelWorld::open(config(&second_root, 42)).unwrap();

    let top_non_air = |world: &mut VoxelWorld| {
        (0..16)
            .rev()
            .find(|&y| !world.get_block(Point3::new(0, y, 0)).unwrap().is_air())
    };
    assert_eq!(top_non_air(&mut first), top_non_air(&mut second));

    for &(x, y, z) in &[(0, 0, 0), (3, 31, -9), (-40, 20, 12), (100, 50, 100)] {
        let position = Point3::new(x, y, z);
        assert_eq!(first.get_block(position).unwrap(), second.get_block(position).unwrap());
    }
    assert_eq!(first.get_block(Point3::new(9, 0, 9)).unwrap().id, BlockId::BEDROCK);
}

#[test]
fn untouched_chunks_are_never_written() {
    let root = TempDir::new("clean");
    let mut world = VoxelWorld::open(config(&root, 3)).unwrap();
    world.update_player(Point3::new(0.0, 30.0, 0.0), no_rotation()).unwrap();
    world.get_block(Point3::new(1, 30, 1)).unwrap();
    world.update_player(Point3::new(500.0, 30.0, 0.0), no_rotation()).unwrap();

    assert_eq!(world.manager_mut().flush_dirty().unwrap(), 0);
    let report = world.shutdown().unwrap();
    assert_eq!(report.saved, 0);
}

#[test]
fn eviction_and_reload_give_identical_contents() {
    let root = TempDir::new("reload");
    let mut world = VoxelWorld::open(config(&root, 11)).unwrap();
    let coordinate = ChunkCoordinate::new(0, 2, 0);

    world.update_player(Point3::new(8.0, 40.0, 8.0), no_rotation()).unwrap();
    world
        .set_block(Point3::new(2, 36, 2), BlockInstance::new(BlockId::WATER))
        .unwrap();
    let before = world.manager().chunk(coordinate).unwrap().snapshot();

    world.update_player(Point3::new(8.0, 40.0, 800.0), no_rotation()).unwrap();
    world.update_player(Point3::new(8.0, 40.0, 8.0), no_rotation()).unwrap();
    world.manager_mut().process_completed();

    let after = world.manager().chunk(coordinate).unwrap();
    assert_eq!(after.snapshot().cells(), before.cells());
    assert!(!after.is_dirty());
}

#[test]
fn corrupt_chunk_files_are_regenerated() {
    let root = TempDir::new("corrupt");
    let mut world = VoxelWorld::open(config(&root, 5)).unwrap();
    let coordinate = ChunkCoordinate::new(0, 0, 0);
    let path = world.persistence().layout().chunk_path(coordinate);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ this is not a chunk").unwrap();

    let sources = Arc::new(Mutex::new(Vec::new()));
    let recorded = sources.clone();
    world.manager_mut().subscribe(move |event| {
        if let ChunkEvent::Loaded { source, .. } = event {
            recorded.lock().unwrap().push(*source);
        }
    });

    let block = world.get_block(Point3::new(4, 0, 4)).unwrap();
    assert_eq!(block.id, world.generator().block_at(Point3::new(4, 0, 4)));
    assert_eq!(*sources.lock().unwrap(), vec![ChunkSource::Regenerated]);
    assert_eq!(world.manager().stats().regenerated, 1);
}

#[test]
fn block_changes_are_published_once_per_change() {
    let root = TempDir::new("events");
    let mut world = VoxelWorld::open(config(&root, 9)).unwrap();
    let events = Arc::new(Mutex::new(Vec::new()));
    let recorded = events.clone();
    let id = world
        .manager_mut()
        .subscribe(move |event| recorded.lock().unwrap().push(*event));

    let position = Point3::new(1, 100, 1);
    let sand = BlockInstance::new(BlockId::SAND);
    assert_eq!(world.set_block(position, sand).unwrap(), BlockInstance::AIR);
    assert_eq!(world.set_block(position, sand).unwrap(), sand);

    let changes: Vec<ChunkEvent> = events
        .lock()
        .unwrap()
        .iter()
        .filter(|event| matches!(event, ChunkEvent::BlockChanged { .. }))
        .copied()
        .collect();
    assert_eq!(
        changes,
        vec![ChunkEvent::BlockChanged {
            coordinate: ChunkCoordinate::new(0, 6, 0),
            local: Point3::new(1, 4, 1),
            previous: BlockInstance::AIR,
            current: sand,
        }]
    );

    assert!(world.manager_mut().unsubscribe(id));
    assert!(!world.manager_mut().unsubscribe(id));
}

#[test]
fn invalid_writes_are_rejected() {
    let root = TempDir::new("invalid");
    let mut world = VoxelWorld::open(config(&root, 1)).unwrap();
    let position = Point3::new(0, 120, 0);

    assert!(matches!(
        world.set_block(position, BlockInstance::new(BlockId(999))),
        Err(WorldError::Manager(ManagerError::Registry(_)))
    ));
    assert!(matches!(
        world.set_block(position, BlockInstance::with_metadata(BlockId::STONE, 1)),
        Err(WorldError::Manager(ManagerError::MetadataNotSupported(BlockId::STONE)))
    ));
    assert_eq!(world.get_block(position).unwrap(), BlockInstance::AIR);
}

#[test]
fn reopening_with_another_seed_fails() {
    let root = TempDir::new("seed");
    VoxelWorld::open(config(&root, 1)).unwrap().shutdown().unwrap();

    assert!(matches!(
        VoxelWorld::open(config(&root, 2)),
        Err(WorldError::SeedMismatch { stored: 1, configured: 2, .. })
    ));
}

#[test]
fn a_shut_down_manager_refuses_requests() {
    let root = TempDir::new("shutdown");
    let mut world = VoxelWorld::open(config(&root, 4)).unwrap();
    world.set_block(Point3::new(0, 60, 0), BlockInstance::new(BlockId::DIRT)).unwrap();

    let report = world.manager_mut().shutdown();
    assert_eq!(report.saved, 1);
    assert!(world.manager().is_shut_down());
    assert!(matches!(
        world.get_block(Point3::new(0, 60, 0)),
        Err(WorldError::Manager(ManagerError::ChunkUnavailable(_)))
    ));
    assert!(world.manager_mut().shutdown().failed.is_empty());
}

#[test]
fn oversized_regions_are_clamped() {
    let root = TempDir::new("clamp");
    let config = config(&root, 42);
    let registry = Arc::new(BlockRegistry::with_defaults().unwrap());
    let generator = WorldGenerator::new(
        config.seed,
        config.chunk_dimension,
        config.generation.clone(),
        &registry,
    )
    .unwrap();
    let persistence = ChunkPersistence::new(
        config.save_layout(),
        registry.clone(),
        config.seed,
        config.chunk_dimension,
    );
    let settings = ManagerSettings {
        worker_count: 0,
        unload_margin: u32::MAX,
        max_radius: 1,
        ..ManagerSettings::default()
    };
    let mut manager =
        ChunkManager::new(registry, Arc::new(generator), Arc::new(persistence), settings);

    let update = manager
        .update_active_region(ChunkCoordinate::new(0, 0, 0), u32::MAX)
        .unwrap();
    assert_eq!(update.requested.len(), 7);

    let update = manager
        .update_active_region(ChunkCoordinate::new(1000, 0, 0), 1)
        .unwrap();
    assert!(update.evicted.is_empty());
    assert_eq!(manager.resident_count(), 7);
    assert_eq!(manager.shutdown().cancelled_loads, 7);
}
