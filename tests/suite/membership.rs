//! Identity resolution policies and domain mutations.

use std::sync::Arc;
use std::time::Duration;

use bulwark_core::{DomainRole, RegionIndex};
use bulwark_identity::{DomainTarget, IdentityResolver, ResolutionPolicy, ResolveError};
use bulwark_types::{Domain, GroupId, PrincipalId};
use proptest::prelude::*;

use crate::common::{alice, bob, cube, id, profiles};

fn resolver(service: Arc<bulwark_identity::StaticProfileService>) -> IdentityResolver {
    IdentityResolver::new(service, tokio::runtime::Handle::current(), 2)
}

#[tokio::test]
async fn uuid_only_rejects_names_without_a_lookup() {
    let service = profiles(Duration::ZERO);
    let resolver = resolver(service.clone());

    let err = resolver
        .resolve([alice().to_string(), "Bob".to_owned()], ResolutionPolicy::UuidOnly)
        .await
        .unwrap_err();
    assert_eq!(err, ResolveError::UnresolvedTokens(vec!["Bob".to_owned()]));
    assert_eq!(service.calls(), 0);

    let batch = resolver
        .resolve([alice().to_string()], ResolutionPolicy::UuidOnly)
        .await
        .unwrap();
    assert!(batch.domain().contains_player(&alice()));
    assert_eq!(service.calls(), 0);
}

#[tokio::test]
async fn name_only_never_parses_identifiers() {
    let service = profiles(Duration::ZERO);
    let resolver = resolver(service.clone());

    let err = resolver
        .resolve([alice().to_string()], ResolutionPolicy::NameOnly)
        .await
        .unwrap_err();
    assert_eq!(err, ResolveError::UnresolvedTokens(vec![alice().to_string()]));
    assert_eq!(service.calls(), 1);

    let batch = resolver
        .resolve(["alice", "g:Builders"], ResolutionPolicy::NameOnly)
        .await
        .unwrap();
    assert!(batch.domain().contains_player(&alice()));
    assert!(batch.domain().contains_group(&GroupId::new("builders")));
}

#[tokio::test]
async fn uuid_and_name_mixes_both_and_fails_as_a_whole() {
    let service = profiles(Duration::ZERO);
    let resolver = resolver(service.clone());

    let batch = resolver
        .resolve([alice().to_string(), "Bob".to_owned()], ResolutionPolicy::UuidAndName)
        .await
        .unwrap();
    assert_eq!(batch.domain().size(), 2);

    let err = resolver
        .resolve(["Bob", "Nobody"], ResolutionPolicy::UuidAndName)
        .await
        .unwrap_err();
    assert_eq!(err, ResolveError::UnresolvedTokens(vec!["Nobody".to_owned()]));
}

#[tokio::test]
async fn resolved_batches_mutate_only_when_applied() {
    let index = Arc::new(RegionIndex::new("world"));
    index.add(cube("home", (0, 0, 0), (5, 5, 5))).unwrap();
    let resolver = resolver(profiles(Duration::ZERO));
    let target = DomainTarget::new(Arc::clone(&index), id("home"), DomainRole::Members);

    let batch = resolver
        .resolve(["Alice", "Bob"], ResolutionPolicy::NameOnly)
        .await
        .unwrap();
    let mutation = batch.clone().as_addition(target.clone());
    assert!(index.get(&id("home")).unwrap().members().is_empty());

    let members = mutation.await.unwrap();
    assert_eq!(members.size(), 2);

    let members = batch.as_removal(target).await.unwrap();
    assert!(members.is_empty());
    assert!(!index.get(&id("home")).unwrap().is_member(&bob(), &bulwark_types::NoGroups));
}

fn players(ids: &[u8], offset: u128) -> Domain {
    ids.iter().fold(Domain::new(), |domain, n| {
        domain.with_player(PrincipalId::from_u128(offset + u128::from(*n)))
    })
}

proptest! {
    #[test]
    fn add_then_remove_restores_the_domain(
        prior in proptest::collection::vec(any::<u8>(), 0..8),
        delta in proptest::collection::vec(any::<u8>(), 0..8),
    ) {
        let original = players(&prior, 0);
        let delta = players(&delta, 1u128 << 64);

        let mut domain = original.clone();
        domain.add_all(&delta);
        let once = domain.clone();
        prop_assert_eq!(domain.add_all(&delta), 0);
        prop_assert_eq!(&domain, &once);

        domain.remove_all_of(&delta);
        prop_assert_eq!(&domain, &original);
        prop_assert_eq!(domain.remove_all_of(&delta), 0);
        prop_assert_eq!(&domain, &original);
    }
}
