//! The external name -> identifier lookup service.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bulwark_types::PrincipalId;

use crate::error::ProfileError;

/// A player known to the profile service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: PrincipalId,
    pub name: String,
}

pub type ProfileFut<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<Profile>, ProfileError>> + Send + 'a>>;

/// Batch name lookup.
///
/// Names the service does not know are simply absent from the result.
pub trait ProfileService: Send + Sync {
    fn find_by_names<'a>(&'a self, names: &'a [String]) -> ProfileFut<'a>;
}

/// In-memory profile table for offline hosts and tests.
#[derive(Debug, Default)]
pub struct StaticProfileService {
    profiles: HashMap<String, Profile>,
    delay: Duration,
    calls: AtomicUsize,
}

impl StaticProfileService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_profile(mut self, name: impl Into<String>, id: PrincipalId) -> Self {
        let name = name.into();
        self.profiles
            .insert(name.to_lowercase(), Profile { id, name });
        self
    }

    /// Simulated round-trip latency.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of lookups served so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProfileService for StaticProfileService {
    fn find_by_names<'a>(&'a self, names: &'a [String]) -> ProfileFut<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let found: Vec<Profile> = names
            .iter()
            .filter_map(|name| self.profiles.get(&name.to_lowercase()))
            .cloned()
            .collect();
        let delay = self.delay;
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(found)
        })
    }
}
