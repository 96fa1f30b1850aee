//! Movement checks through the engine's per-world session caches.

use std::time::{Duration, Instant};

use bulwark_config::GuardConfig;
use bulwark_engine::{EntityKind, EntityMove, MoveVerdict, PlayerMove};
use bulwark_types::{AttributeKey, BlockVector, EntityId, State};

use crate::common::{cube, engine, profiles, with_state};

fn step(entity: u64, from: BlockVector, to: BlockVector) -> EntityMove {
    EntityMove {
        entity: EntityId::new(entity),
        kind: EntityKind::Living,
        world: "world".to_owned(),
        from,
        to,
    }
}

#[tokio::test]
async fn exit_hysteresis_disallows_only_the_first_restrictive_edge() {
    let engine = engine(GuardConfig::default(), profiles(Duration::ZERO));
    let world = engine.create_world("world");
    world
        .index()
        .add(with_state(
            cube("pen", (5, 0, 0), (5, 10, 10)),
            AttributeKey::MobExit,
            State::Deny,
        ))
        .unwrap();

    let open = BlockVector::new(4, 1, 1);
    let also_open = BlockVector::new(4, 2, 1);
    let closed = BlockVector::new(5, 1, 1);
    let start = Instant::now();
    let moves = [
        step(9, open, also_open),
        step(9, also_open, closed),
        step(9, also_open, closed),
        step(9, closed, open),
    ];

    let verdicts: Vec<MoveVerdict> = moves
        .iter()
        .enumerate()
        .map(|(tick, event)| {
            let now = start + Duration::from_millis(50 * tick as u64);
            engine.movement().on_entity_move(event, now)
        })
        .collect();
    assert_eq!(
        verdicts,
        vec![
            MoveVerdict::Allow,
            MoveVerdict::Cancel,
            MoveVerdict::Allow,
            MoveVerdict::Allow
        ]
    );
}

#[tokio::test]
async fn entry_deny_blocks_every_attempt() {
    let engine = engine(GuardConfig::default(), profiles(Duration::ZERO));
    let world = engine.create_world("world");
    world
        .index()
        .add(with_state(
            cube("farm", (0, 0, 0), (10, 10, 10)),
            AttributeKey::MobEntry,
            State::Deny,
        ))
        .unwrap();

    let outside = BlockVector::new(-1, 1, 1);
    let inside = BlockVector::new(0, 1, 1);
    let now = Instant::now();
    for _ in 0..3 {
        assert_eq!(
            engine.movement().on_entity_move(&step(1, outside, inside), now),
            MoveVerdict::Cancel
        );
    }

    let ride = PlayerMove {
        world: "world".to_owned(),
        vehicle: Some(EntityId::new(2)),
        from: outside,
        to: inside,
    };
    assert_eq!(engine.movement().on_player_move(&ride, now), MoveVerdict::Eject);
}

#[tokio::test]
async fn worlds_with_entity_move_disabled_allow_everything() {
    let mut config = GuardConfig::default();
    config.movement.entity_move = false;
    let engine = engine(config, profiles(Duration::ZERO));
    let world = engine.create_world("world");
    world
        .index()
        .add(with_state(
            cube("farm", (0, 0, 0), (10, 10, 10)),
            AttributeKey::MobEntry,
            State::Deny,
        ))
        .unwrap();

    let verdict = engine.movement().on_entity_move(
        &step(1, BlockVector::new(-1, 1, 1), BlockVector::new(0, 1, 1)),
        Instant::now(),
    );
    assert_eq!(verdict, MoveVerdict::Allow);
    assert!(world.sessions().is_empty());
}

#[tokio::test]
async fn tick_sweeps_idle_sessions() {
    let config = GuardConfig::default();
    let idle = config.movement.session_idle();
    let mut engine = engine(config, profiles(Duration::ZERO));
    let world = engine.create_world("world");

    let start = Instant::now();
    for entity in 0..4 {
        engine.movement().on_entity_move(
            &step(entity, BlockVector::new(0, 0, 0), BlockVector::new(1, 0, 0)),
            start,
        );
    }
    assert_eq!(world.sessions().len(), 4);

    engine.tick(start + idle + Duration::from_secs(60));
    assert!(world.sessions().is_empty());
}
