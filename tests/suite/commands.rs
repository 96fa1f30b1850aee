//! Membership and region commands end to end, from sender to reply.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bulwark_config::GuardConfig;
use bulwark_engine::{
    ChangeCause, CommandError, CommandSource, CommandStatus, HookOutcome, MembershipArgs,
    PendingChange, RegionHooks, Targets,
};
use bulwark_identity::ResolutionPolicy;
use bulwark_types::{
    Actor, AttributeKey, AttributeValue, BlockVector, Bounds, Domain, FlagSetting, NoGroups,
};

use crate::common::{RecordingSink, alice, bob, carol, cube, engine, id, profiles, settle};

fn tokens(names: &[&str]) -> Targets {
    Targets::Tokens(names.iter().map(|n| (*n).to_owned()).collect())
}

fn buyable(name: &str) -> bulwark_core::Region {
    cube(name, (100, 0, 100), (110, 10, 110))
        .with_flag(
            AttributeKey::Buyable,
            FlagSetting::unrestricted(AttributeValue::Boolean(true)),
        )
        .unwrap()
}

/// Records every change it sees and vetoes claims of ids starting with
/// "reserved".
#[derive(Default)]
struct Market {
    seen: Mutex<Vec<(ChangeCause, String, usize)>>,
}

impl RegionHooks for Market {
    fn before_commit(&self, change: &PendingChange<'_>) -> HookOutcome {
        self.seen.lock().unwrap().push((
            change.cause,
            change.region.id().to_string(),
            change.region.owners().size(),
        ));
        if change.cause == ChangeCause::Claim && change.region.id().key().starts_with("reserved") {
            HookOutcome::cancel("market")
        } else {
            HookOutcome::proceed()
        }
    }
}

#[tokio::test]
async fn owner_adds_and_removes_members() {
    let mut engine = engine(GuardConfig::default(), profiles(Duration::ZERO));
    let world = engine.create_world("world");
    world
        .index()
        .add(cube("Home", (0, 0, 0), (10, 10, 10)).with_owners(Domain::new().with_player(alice())))
        .unwrap();
    let sink = RecordingSink::new();
    let owner = CommandSource::player(Actor::new(alice()), sink.clone());

    engine
        .add_members(
            &owner,
            MembershipArgs::new("world", "home", tokens(&["Bob", "Carol", "g:friends"])),
        )
        .unwrap();
    settle(&mut engine).await;
    let home = world.index().get(&id("home")).unwrap();
    assert!(home.is_member(&bob(), &NoGroups));
    assert!(home.is_member(&carol(), &NoGroups));
    assert_eq!(home.members().size(), 3);

    engine
        .remove_members(
            &owner,
            MembershipArgs::new("world", "home", tokens(&["carol"])),
        )
        .unwrap();
    settle(&mut engine).await;
    let home = world.index().get(&id("home")).unwrap();
    assert!(!home.is_member(&carol(), &NoGroups));

    assert_eq!(
        sink.messages(),
        vec![
            "Region 'Home' in world 'world' updated with new members.",
            "Region 'Home' in world 'world' updated with members removed.",
        ]
    );
}

#[tokio::test]
async fn failed_resolution_leaves_the_region_untouched() {
    let mut engine = engine(GuardConfig::default(), profiles(Duration::ZERO));
    let world = engine.create_world("world");
    world.index().add(cube("home", (0, 0, 0), (10, 10, 10))).unwrap();
    let sink = RecordingSink::new();
    let console = CommandSource::console(sink.clone());

    engine
        .add_owners(
            &console,
            MembershipArgs::new("world", "home", tokens(&["Bob"]))
                .with_policy(ResolutionPolicy::UuidOnly),
        )
        .unwrap();
    settle(&mut engine).await;

    assert!(world.index().get(&id("home")).unwrap().owners().is_empty());
    let reply = sink.last().unwrap();
    assert!(reply.starts_with("Failed to add new owners: "), "{reply}");
    assert!(reply.contains("Bob"), "{reply}");
}

#[tokio::test]
async fn buying_runs_claim_hooks_with_the_future_owners() {
    let market = Arc::new(Market::default());
    let mut engine =
        engine(GuardConfig::default(), profiles(Duration::ZERO)).with_hooks(market.clone());
    let world = engine.create_world("world");
    world.index().add(buyable("stall")).unwrap();
    world.index().add(buyable("reserved-stall")).unwrap();
    let sink = RecordingSink::new();
    let buyer = CommandSource::player(Actor::new(bob()), sink.clone());

    engine
        .add_owners(&buyer, MembershipArgs::new("world", "stall", tokens(&["Bob"])))
        .unwrap();
    engine
        .add_owners(
            &buyer,
            MembershipArgs::new("world", "reserved-stall", tokens(&["Bob"])),
        )
        .unwrap();
    settle(&mut engine).await;

    assert!(world.index().get(&id("stall")).unwrap().is_owner(&bob(), &NoGroups));
    assert!(
        world
            .index()
            .get(&id("reserved-stall"))
            .unwrap()
            .owners()
            .is_empty()
    );
    assert!(
        sink.messages()
            .contains(&"Failed to add new owners: The region claim was cancelled by market.".to_owned()),
        "{:?}",
        sink.messages()
    );
    let seen = market.seen.lock().unwrap().clone();
    assert!(seen.contains(&(ChangeCause::Claim, "stall".to_owned(), 1)));
}

#[tokio::test]
async fn selling_to_a_player_at_quota_is_refused_up_front() {
    let mut config = GuardConfig::default();
    config.regions.max_region_count = 2;
    let engine = engine(config, profiles(Duration::ZERO));
    let world = engine.create_world("world");
    let owned = Domain::new().with_player(carol());
    world
        .index()
        .add(cube("one", (0, 0, 0), (1, 1, 1)).with_owners(owned.clone()))
        .unwrap();
    world
        .index()
        .add(cube("two", (2, 0, 0), (3, 1, 1)).with_owners(owned))
        .unwrap();
    world.index().add(buyable("stall")).unwrap();
    let buyer = CommandSource::player(Actor::new(carol()), RecordingSink::new());

    let err = engine
        .add_owners(&buyer, MembershipArgs::new("world", "stall", tokens(&["Carol"])))
        .unwrap_err();
    assert!(matches!(err, CommandError::QuotaExceeded { limit: 2 }));
    assert!(engine.supervisor().is_empty());
}

#[tokio::test]
async fn cancelled_commands_never_mutate() {
    let mut config = GuardConfig::default();
    config.resolver.max_concurrent_lookups = 1;
    let mut engine = engine(config, profiles(Duration::from_millis(100)));
    let world = engine.create_world("world");
    world.index().add(cube("home", (0, 0, 0), (10, 10, 10))).unwrap();
    let sink = RecordingSink::new();
    let console = CommandSource::console(sink.clone());

    let first = engine
        .add_members(&console, MembershipArgs::new("world", "home", tokens(&["Alice"])))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = engine
        .add_members(&console, MembershipArgs::new("world", "home", tokens(&["Bob"])))
        .unwrap();
    assert_eq!(engine.supervisor().len(), 2);
    let CommandStatus::Pending(cancel) = second else {
        panic!("second command should be waiting on resolution");
    };
    cancel.cancel();
    settle(&mut engine).await;
    drop(first);

    let home = world.index().get(&id("home")).unwrap();
    assert!(home.is_member(&alice(), &NoGroups));
    assert!(!home.is_member(&bob(), &NoGroups));
    assert_eq!(
        sink.messages()
            .iter()
            .filter(|m| m.starts_with("Failed to add new members"))
            .count(),
        1
    );
}

#[tokio::test]
async fn define_and_redefine_notify_hooks() {
    let market = Arc::new(Market::default());
    let engine =
        engine(GuardConfig::default(), profiles(Duration::ZERO)).with_hooks(market.clone());
    engine.create_world("world");
    let sink = RecordingSink::new();
    let alice_source = CommandSource::player(Actor::new(alice()), sink.clone());

    engine
        .claim_region(&alice_source, "world", cube("yard", (0, 0, 0), (4, 4, 4)))
        .unwrap();
    engine
        .redefine_region(
            &alice_source,
            "world",
            "yard",
            Bounds::cuboid(BlockVector::new(0, 0, 0), BlockVector::new(8, 8, 8)),
        )
        .unwrap();
    let err = engine
        .claim_region(&alice_source, "world", cube("Yard", (0, 0, 0), (1, 1, 1)))
        .unwrap_err();
    assert!(matches!(err, CommandError::Region(bulwark_core::RegionError::DuplicateId(_))));

    let causes: Vec<ChangeCause> = market
        .seen
        .lock()
        .unwrap()
        .iter()
        .map(|(cause, _, _)| *cause)
        .collect();
    assert_eq!(causes, vec![ChangeCause::Claim, ChangeCause::Redefine]);
    assert_eq!(
        sink.messages(),
        vec![
            "A new region has been claimed named 'yard'.",
            "Region 'yard' updated with new area.",
        ]
    );
}

#[tokio::test]
async fn cancel_during_lookup_leaves_the_region_untouched() {
    let mut engine = engine(GuardConfig::default(), profiles(Duration::from_millis(100)));
    let world = engine.create_world("world");
    world.index().add(cube("home", (0, 0, 0), (10, 10, 10))).unwrap();
    let sink = RecordingSink::new();
    let console = CommandSource::console(sink.clone());

    let status = engine
        .add_members(&console, MembershipArgs::new("world", "home", tokens(&["Bob"])))
        .unwrap();
    let CommandStatus::Pending(cancel) = status else {
        panic!("command should be waiting on resolution");
    };
    // the lookup is already running when the sender goes away
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();
    settle(&mut engine).await;

    let home = world.index().get(&id("home")).unwrap();
    assert!(!home.is_member(&bob(), &NoGroups));
    assert!(home.members().is_empty());
    let failures: Vec<_> = sink
        .messages()
        .into_iter()
        .filter(|m| m.starts_with("Failed to add new members"))
        .collect();
    assert_eq!(failures, vec!["Failed to add new members: resolution was cancelled"]);
}

#[tokio::test]
async fn competing_buyers_leave_a_single_owner() {
    let mut engine = engine(GuardConfig::default(), profiles(Duration::from_millis(20)));
    let world = engine.create_world("world");
    world.index().add(buyable("stall")).unwrap();
    let alice_sink = RecordingSink::new();
    let bob_sink = RecordingSink::new();
    let alice_source = CommandSource::player(Actor::new(alice()), alice_sink.clone());
    let bob_source = CommandSource::player(Actor::new(bob()), bob_sink.clone());

    let first = engine
        .add_owners(&alice_source, MembershipArgs::new("world", "stall", tokens(&["Alice"])))
        .unwrap();
    let second = engine
        .add_owners(&bob_source, MembershipArgs::new("world", "stall", tokens(&["Bob"])))
        .unwrap();
    assert!(first.is_pending() && second.is_pending());
    settle(&mut engine).await;

    let stall = world.index().get(&id("stall")).unwrap();
    assert_eq!(stall.owners().size(), 1);
    let replies: Vec<String> = alice_sink
        .messages()
        .into_iter()
        .chain(bob_sink.messages())
        .collect();
    let successes = replies
        .iter()
        .filter(|m| m.as_str() == "Region 'stall' in world 'world' updated with new owners.")
        .count();
    let refusals = replies
        .iter()
        .filter(|m| m.as_str() == "Failed to add new owners: This region has already been claimed.")
        .count();
    assert_eq!((successes, refusals), (1, 1), "{replies:?}");
}

#[tokio::test]
async fn quota_is_checked_again_when_a_purchase_lands() {
    let mut config = GuardConfig::default();
    config.regions.max_region_count = 2;
    let mut engine = engine(config, profiles(Duration::from_millis(20)));
    let world = engine.create_world("world");
    world
        .index()
        .add(cube("one", (0, 0, 0), (1, 1, 1)).with_owners(Domain::new().with_player(carol())))
        .unwrap();
    world.index().add(buyable("north-stall")).unwrap();
    world.index().add(buyable("south-stall")).unwrap();
    let sink = RecordingSink::new();
    let buyer = CommandSource::player(Actor::new(carol()), sink.clone());

    // both pass the up-front check while Carol owns a single region
    engine
        .add_owners(&buyer, MembershipArgs::new("world", "north-stall", tokens(&["Carol"])))
        .unwrap();
    engine
        .add_owners(&buyer, MembershipArgs::new("world", "south-stall", tokens(&["Carol"])))
        .unwrap();
    settle(&mut engine).await;

    assert_eq!(world.index().count_owned_by(&carol()), 2);
    assert!(
        sink.messages()
            .contains(&"Failed to add new owners: You cannot own more than 2 regions.".to_owned()),
        "{:?}",
        sink.messages()
    );
}
