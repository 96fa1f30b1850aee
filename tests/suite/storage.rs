//! Saving and loading worlds through the engine.

use std::sync::Arc;
use std::time::Duration;

use bulwark_config::GuardConfig;
use bulwark_core::{JsonRegionStore, RegionError, RegionStore, StoreError};
use bulwark_engine::{CommandError, CommandSource};
use bulwark_types::{AttributeKey, AttributeValue, BlockVector, State};
use tempfile::tempdir;

use crate::common::{RecordingSink, cube, engine, id, profiles, with_state};

#[tokio::test]
async fn defined_regions_survive_a_save_and_reload() {
    let dir = tempdir().unwrap();
    let store = JsonRegionStore::new(dir.path().join("world.json"));

    let first = engine(GuardConfig::default(), profiles(Duration::ZERO));
    first.create_world("world");
    let console = CommandSource::console(RecordingSink::new());
    first
        .define_region(
            &console,
            "world",
            with_state(
                cube("arena", (0, 0, 0), (30, 10, 30)).with_priority(2),
                AttributeKey::Pvp,
                State::Allow,
            ),
        )
        .unwrap();
    first
        .define_region(
            &console,
            "world",
            cube("pit", (10, 0, 10), (12, 3, 12)).with_parent(id("arena")),
        )
        .unwrap();
    first.save_world("world", &store).unwrap();

    let second = engine(GuardConfig::default(), profiles(Duration::ZERO));
    let world = second.load_world("world", &store).unwrap();
    assert_eq!(world.index().len(), 2);

    let set = world.index().query(BlockVector::new(11, 1, 11));
    let pvp = set.resolve_attribute(AttributeKey::Pvp, None);
    assert_eq!(pvp.value(), Some(&AttributeValue::State(State::Allow)));
    assert_eq!(pvp.source().map(|r| r.id().clone()), Some(id("arena")));
}

#[tokio::test]
async fn a_missing_file_loads_an_empty_world() {
    let dir = tempdir().unwrap();
    let store = JsonRegionStore::new(dir.path().join("nether.json"));
    let engine = engine(GuardConfig::default(), profiles(Duration::ZERO));

    let world = engine.load_world("nether", &store).unwrap();
    assert!(world.index().is_empty());
}

#[tokio::test]
async fn unknown_format_versions_are_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("world.json");
    std::fs::write(
        &path,
        serde_json::to_vec(&serde_json::json!({ "version": 9, "regions": [] })).unwrap(),
    )
    .unwrap();
    let engine = engine(GuardConfig::default(), profiles(Duration::ZERO));

    let err = engine
        .load_world("world", &JsonRegionStore::new(&path))
        .unwrap_err();
    assert!(matches!(
        err,
        CommandError::Store(StoreError::UnsupportedVersion { version: 9, .. })
    ));
    assert!(engine.worlds().get("world").is_none());
}

#[tokio::test]
async fn cyclic_parents_in_a_file_are_rejected() {
    let dir = tempdir().unwrap();
    let store = JsonRegionStore::new(dir.path().join("world.json"));
    store
        .save(&[
            Arc::new(cube("a", (0, 0, 0), (1, 1, 1)).with_parent(id("b"))),
            Arc::new(cube("b", (0, 0, 0), (1, 1, 1)).with_parent(id("a"))),
        ])
        .unwrap();
    let engine = engine(GuardConfig::default(), profiles(Duration::ZERO));

    let err = engine.load_world("world", &store).unwrap_err();
    assert!(matches!(
        err,
        CommandError::Region(RegionError::CyclicParent { .. })
    ));
}

#[tokio::test]
async fn polygons_without_enough_points_are_rejected_on_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("world.json");
    let document = serde_json::json!({
        "version": 1,
        "regions": [{
            "id": "flat",
            "bounds": { "type": "polygon", "points": [], "min_y": 0, "max_y": 5 },
        }],
    });
    std::fs::write(&path, serde_json::to_vec(&document).unwrap()).unwrap();
    let engine = engine(GuardConfig::default(), profiles(Duration::ZERO));

    let err = engine
        .load_world("world", &JsonRegionStore::new(&path))
        .unwrap_err();
    assert!(matches!(err, CommandError::Store(StoreError::Format { .. })));
    assert!(engine.worlds().get("world").is_none());
}

#[tokio::test]
async fn inverted_cuboid_corners_are_normalized_on_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("world.json");
    let document = serde_json::json!({
        "version": 1,
        "regions": [{
            "id": "box",
            "bounds": {
                "type": "cuboid",
                "min": { "x": 10, "y": 10, "z": 10 },
                "max": { "x": 0, "y": 0, "z": 0 },
            },
        }],
    });
    std::fs::write(&path, serde_json::to_vec(&document).unwrap()).unwrap();
    let engine = engine(GuardConfig::default(), profiles(Duration::ZERO));

    let world = engine
        .load_world("world", &JsonRegionStore::new(&path))
        .unwrap();
    let set = world.index().query(BlockVector::new(5, 5, 5));
    assert_eq!(set.len(), 1);
    assert!(set.get(&id("box")).is_some());
}
