use cgmath::{Point3, Vector3};
use voxel_world::{
    voxels::{
        block::{BlockId, BlockInstance},
        chunk::ChunkCoordinate,
        manager::{required_coordinates, ChunkState},
    },
    VoxelWorld,
};

mod common;
use common::{config, TempDir};

#[test]
fn workers_fill_the_active_region() {
    let root = TempDir::new("workers-fill");
    let mut config = config(&root, 42);
    config.worker_count = 4;
    config.active_radius = 2;
    let mut world = VoxelWorld::open(config).unwrap();

    let update = world
        .update_player(Point3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 0.0))
        .unwrap();
    let expected = required_coordinates(ChunkCoordinate::new(0, 0, 0), 2);
    assert_eq!(update.requested, expected);
    assert_eq!(update.requested[0], ChunkCoordinate::new(0, 0, 0));

    assert!(world.manager_mut().wait_until_idle());
    assert_eq!(world.manager().resident_count(), expected.len());
    assert_eq!(world.manager().pending_loads(), 0);
    for coordinate in expected {
        assert_eq!(
            world.manager().state_of(coordinate),
            ChunkState::Resident { dirty: false }
        );
    }
}

#[test]
fn edits_made_while_loading_are_kept() {
    let root = TempDir::new("workers-edit");
    let mut config = config(&root, 42);
    config.worker_count = 2;
    let mut world = VoxelWorld::open(config).unwrap();

    world
        .update_player(Point3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 0.0))
        .unwrap();
    let position = Point3::new(5, 10, 5);
    world
        .set_block(position, BlockInstance::new(BlockId::STONE))
        .unwrap();

    world
        .update_player(Point3::new(320.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 0.0))
        .unwrap();
    world
        .update_player(Point3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 0.0))
        .unwrap();
    assert_eq!(world.get_block(position).unwrap().id, BlockId::STONE);

    assert!(world.manager_mut().wait_until_idle());
    let report = world.shutdown().unwrap();
    assert!(report.failed.is_empty());
}

#[test]
fn background_flush_cleans_dirty_chunks() {
    let root = TempDir::new("workers-flush");
    let mut config = config(&root, 9);
    config.worker_count = 3;
    let mut world = VoxelWorld::open(config).unwrap();

    for x in 0..4 {
        world
            .set_block(Point3::new(x * 16, 70, 0), BlockInstance::new(BlockId::SAND))
            .unwrap();
    }
    assert_eq!(world.manager_mut().flush_dirty().unwrap(), 4);
    assert!(world.manager_mut().wait_until_idle());

    for x in 0..4 {
        let coordinate = ChunkCoordinate::new(x, 4, 0);
        assert_eq!(
            world.manager().state_of(coordinate),
            ChunkState::Resident { dirty: false }
        );
        assert!(world.persistence().exists(coordinate));
    }
    assert_eq!(world.manager().stats().saved, 4);
}
