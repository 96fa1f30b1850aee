//! Attribute resolution over overlapping, nested regions.

use bulwark_core::RegionIndex;
use bulwark_core::session::state_deny_wins;
use bulwark_types::{
    Actor, AttributeKey, AttributeValue, BlockVector, Domain, FlagSetting, RegionGroup, State,
};

use crate::common::{alice, bob, cube, id, with_state};

fn entry_at(index: &RegionIndex, point: BlockVector, actor: Option<&Actor>) -> Option<State> {
    index
        .query(point)
        .resolve_attribute(AttributeKey::Entry, actor)
        .value()
        .and_then(AttributeValue::as_state)
}

#[test]
fn equal_priority_siblings_resolve_by_insertion_order() {
    let index = RegionIndex::new("world");
    index
        .add(with_state(
            cube("x", (0, 0, 0), (20, 20, 20)).with_priority(10),
            AttributeKey::Entry,
            State::Deny,
        ))
        .unwrap();
    index
        .add(with_state(
            cube("y", (10, 0, 10), (30, 20, 30)).with_priority(10),
            AttributeKey::Entry,
            State::Allow,
        ))
        .unwrap();

    let point = BlockVector::new(15, 5, 15);
    for _ in 0..1000 {
        let set = index.query(point);
        let resolved = set.resolve_attribute(AttributeKey::Entry, None);
        assert_eq!(resolved.source().map(|r| r.id().clone()), Some(id("x")));
        assert_eq!(resolved.value(), Some(&AttributeValue::State(State::Deny)));
    }
}

#[test]
fn unset_child_inherits_parent_deny() {
    let index = RegionIndex::new("world");
    index
        .add(with_state(
            cube("a", (0, 0, 0), (100, 100, 100)).with_priority(1),
            AttributeKey::Entry,
            State::Deny,
        ))
        .unwrap();
    index
        .add(
            cube("b", (10, 10, 10), (20, 20, 20))
                .with_priority(5)
                .with_parent(id("a")),
        )
        .unwrap();

    let resolved = index.query(BlockVector::new(15, 15, 15));
    assert_eq!(resolved.len(), 2);
    let entry = resolved.resolve_attribute(AttributeKey::Entry, None);
    assert_eq!(entry.value(), Some(&AttributeValue::State(State::Deny)));
    assert_eq!(entry.source().map(|r| r.id().clone()), Some(id("a")));
}

#[test]
fn inherited_parent_value_keeps_the_parent_priority() {
    let index = RegionIndex::new("world");
    index
        .add(with_state(
            cube("p", (0, 0, 0), (100, 100, 100)).with_priority(10),
            AttributeKey::Entry,
            State::Deny,
        ))
        .unwrap();
    index
        .add(
            cube("c", (10, 10, 10), (20, 20, 20))
                .with_priority(1)
                .with_parent(id("p")),
        )
        .unwrap();
    index
        .add(with_state(
            cube("s", (10, 10, 10), (20, 20, 20)).with_priority(5),
            AttributeKey::Entry,
            State::Allow,
        ))
        .unwrap();

    let point = BlockVector::new(15, 15, 15);
    let set = index.query(point);
    assert_eq!(set.len(), 3);
    let entry = set.resolve_attribute(AttributeKey::Entry, None);
    assert_eq!(entry.value(), Some(&AttributeValue::State(State::Deny)));
    assert_eq!(entry.source().map(|r| r.id().clone()), Some(id("p")));
    assert_eq!(entry_at(&index, point, None), Some(State::Deny));
}

#[test]
fn child_value_overrides_parent_regardless_of_priority() {
    let index = RegionIndex::new("world");
    index
        .add(with_state(
            cube("city", (0, 0, 0), (100, 100, 100)).with_priority(50),
            AttributeKey::Entry,
            State::Deny,
        ))
        .unwrap();
    index
        .add(with_state(
            cube("market", (10, 0, 10), (20, 20, 20))
                .with_priority(-5)
                .with_parent(id("city")),
            AttributeKey::Entry,
            State::Allow,
        ))
        .unwrap();

    assert_eq!(
        entry_at(&index, BlockVector::new(15, 5, 15), None),
        Some(State::Allow)
    );
    assert_eq!(
        entry_at(&index, BlockVector::new(50, 5, 50), None),
        Some(State::Deny)
    );
}

#[test]
fn points_outside_every_region_get_the_catalog_default() {
    let index = RegionIndex::new("world");
    index.add(cube("spawn", (0, 0, 0), (5, 5, 5))).unwrap();

    let set = index.query(BlockVector::new(500, 5, 500));
    assert!(set.is_empty());
    assert_eq!(
        set.resolve_attribute(AttributeKey::Entry, None).value(),
        AttributeKey::Entry.default_value().as_ref()
    );
    assert!(set.resolve_attribute(AttributeKey::Build, None).value().is_none());
}

#[test]
fn group_values_apply_only_to_members_of_the_defining_region() {
    let index = RegionIndex::new("world");
    index
        .add(
            cube("vault", (0, 0, 0), (10, 10, 10))
                .with_members(Domain::new().with_player(alice()))
                .with_flag(
                    AttributeKey::Entry,
                    FlagSetting::restricted(
                        RegionGroup::Members,
                        AttributeValue::State(State::Allow),
                    )
                    .with_fallback(AttributeValue::State(State::Deny)),
                )
                .unwrap(),
        )
        .unwrap();

    let point = BlockVector::new(5, 5, 5);
    assert_eq!(
        entry_at(&index, point, Some(&Actor::new(alice()))),
        Some(State::Allow)
    );
    assert_eq!(
        entry_at(&index, point, Some(&Actor::new(bob()))),
        Some(State::Deny)
    );
    assert_eq!(entry_at(&index, point, None), Some(State::Deny));
}

#[test]
fn callers_apply_deny_wins_across_equal_priority_leaves() {
    let index = RegionIndex::new("world");
    index
        .add(with_state(
            cube("first", (0, 0, 0), (10, 10, 10)).with_priority(3),
            AttributeKey::MobEntry,
            State::Allow,
        ))
        .unwrap();
    index
        .add(with_state(
            cube("second", (0, 0, 0), (10, 10, 10)).with_priority(3),
            AttributeKey::MobEntry,
            State::Deny,
        ))
        .unwrap();

    let set = index.query(BlockVector::new(1, 1, 1));
    assert_eq!(
        set.resolve_attribute(AttributeKey::MobEntry, None).value(),
        Some(&AttributeValue::State(State::Allow))
    );
    assert_eq!(state_deny_wins(&set, AttributeKey::MobEntry), Some(State::Deny));
}

#[test]
fn removing_a_parent_reattaches_children_to_the_grandparent() {
    let index = RegionIndex::new("world");
    index
        .add(with_state(
            cube("world-root", (0, 0, 0), (100, 100, 100)),
            AttributeKey::Entry,
            State::Deny,
        ))
        .unwrap();
    index
        .add(cube("district", (0, 0, 0), (50, 50, 50)).with_parent(id("world-root")))
        .unwrap();
    index
        .add(cube("plot", (0, 0, 0), (5, 5, 5)).with_parent(id("district")))
        .unwrap();

    index.remove(&id("district")).unwrap();
    let plot = index.get(&id("plot")).unwrap();
    assert_eq!(plot.parent(), Some(&id("world-root")));
    assert_eq!(
        entry_at(&index, BlockVector::new(1, 1, 1), None),
        Some(State::Deny)
    );
}
