//! Turning raw command tokens into a verified [`Domain`].
//!
//! Resolution runs on the tokio runtime handed to [`IdentityResolver::new`].
//! A task has two phases:
//!
//! 1. Waiting for a lookup permit. This phase is abortable; a cancelled
//!    task never reaches the profile service.
//! 2. The profile-service round trip. Once started it runs to completion,
//!    but a task cancelled in the meantime reports
//!    [`ResolveError::Cancelled`] instead of the looked-up batch.
//!
//! Either way nothing is mutated here. Changes happen only when the caller
//! applies a [`DomainMutation`](crate::DomainMutation).

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bulwark_types::{Domain, GroupId, PrincipalId};
use futures_util::future::{AbortHandle, Abortable};
use tokio::runtime::Handle;
use tokio::sync::{Semaphore, oneshot};

use crate::error::{ProfileError, ResolveError};
use crate::mutation::ResolvedBatch;
use crate::profile::{Profile, ProfileService};
use crate::queue::SyncHandle;

const GROUP_PREFIX: &str = "g:";

/// How tokens are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionPolicy {
    /// Every token is a player name (or a `g:` group).
    NameOnly,
    /// Every token must be a player identifier.
    UuidOnly,
    /// Identifiers are taken as-is, anything else is looked up by name.
    #[default]
    UuidAndName,
}

impl fmt::Display for ResolutionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResolutionPolicy::NameOnly => "name-only",
            ResolutionPolicy::UuidOnly => "uuid-only",
            ResolutionPolicy::UuidAndName => "uuid-and-name",
        })
    }
}

/// Tokens sorted by what they need.
#[derive(Debug, Default)]
struct Plan {
    domain: Domain,
    /// Tokens that need a round trip.
    names: Vec<String>,
}

impl Plan {
    /// Fails with every token that cannot possibly resolve under `policy`.
    fn build(tokens: Vec<String>, policy: ResolutionPolicy) -> Result<Self, ResolveError> {
        let mut plan = Plan::default();
        let mut unresolved = Vec::new();
        for token in tokens {
            let trimmed = token.trim();
            if trimmed.is_empty() {
                unresolved.push(token);
                continue;
            }
            if policy != ResolutionPolicy::UuidOnly
                && let Some(group) = group_name(trimmed)
            {
                plan.domain.add_group(GroupId::new(group));
                continue;
            }
            match policy {
                ResolutionPolicy::UuidOnly => match PrincipalId::parse(trimmed) {
                    Some(id) => {
                        plan.domain.add_player(id);
                    }
                    None => unresolved.push(token),
                },
                ResolutionPolicy::UuidAndName => match PrincipalId::parse(trimmed) {
                    Some(id) => {
                        plan.domain.add_player(id);
                    }
                    None => plan.names.push(trimmed.to_owned()),
                },
                ResolutionPolicy::NameOnly => plan.names.push(trimmed.to_owned()),
            }
        }
        if unresolved.is_empty() {
            Ok(plan)
        } else {
            Err(ResolveError::UnresolvedTokens(unresolved))
        }
    }

    fn finish(self, looked_up: Result<Vec<Profile>, ProfileError>) -> Result<ResolvedBatch, ResolveError> {
        let profiles = looked_up?;
        let by_name: HashMap<String, PrincipalId> = profiles
            .into_iter()
            .map(|profile| (profile.name.to_lowercase(), profile.id))
            .collect();

        let Plan { mut domain, names } = self;
        let mut unresolved = Vec::new();
        for name in names {
            match by_name.get(&name.to_lowercase()) {
                Some(id) => {
                    domain.add_player(*id);
                }
                None => unresolved.push(name),
            }
        }
        if unresolved.is_empty() {
            Ok(ResolvedBatch::new(domain))
        } else {
            Err(ResolveError::UnresolvedTokens(unresolved))
        }
    }
}

fn group_name(token: &str) -> Option<&str> {
    let prefix = token.get(..GROUP_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(GROUP_PREFIX) {
        return None;
    }
    let name = token[GROUP_PREFIX.len()..].trim();
    (!name.is_empty()).then_some(name)
}

/// Resolves tokens off the calling thread.
#[derive(Clone)]
pub struct IdentityResolver {
    service: Arc<dyn ProfileService>,
    runtime: Handle,
    permits: Arc<Semaphore>,
}

impl IdentityResolver {
    /// `max_concurrent` bounds round trips in flight; at least one is allowed.
    #[must_use]
    pub fn new(service: Arc<dyn ProfileService>, runtime: Handle, max_concurrent: usize) -> Self {
        Self {
            service,
            runtime,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Start resolving `tokens`. Returns immediately.
    pub fn resolve<I, S>(&self, tokens: I, policy: ResolutionPolicy) -> ResolveTask
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        let (tx, rx) = oneshot::channel();
        let (abort, registration) = AbortHandle::new_pair();
        let abort_in_task = abort.clone();
        let service = Arc::clone(&self.service);
        let permits = Arc::clone(&self.permits);

        self.runtime.spawn(async move {
            let result = match Plan::build(tokens, policy) {
                Err(err) => Err(err),
                Ok(plan) if plan.names.is_empty() => Ok(ResolvedBatch::new(plan.domain)),
                Ok(plan) => {
                    let permit = match Abortable::new(permits.acquire_owned(), registration).await {
                        Ok(Ok(permit)) => permit,
                        Ok(Err(_closed)) => {
                            let _ = tx.send(Err(ResolveError::ShutDown));
                            return;
                        }
                        Err(_aborted) => {
                            tracing::debug!(%policy, "Resolution cancelled before lookup");
                            return;
                        }
                    };
                    if abort_in_task.is_aborted() {
                        tracing::debug!(%policy, "Resolution cancelled before lookup");
                        return;
                    }
                    let looked_up = service.find_by_names(&plan.names).await;
                    drop(permit);
                    plan.finish(looked_up)
                }
            };
            if tx.send(result).is_err() {
                tracing::debug!(%policy, "Resolution finished after its caller left; result discarded");
            }
        });

        ResolveTask {
            rx,
            abort,
            runtime: self.runtime.clone(),
            finished: false,
        }
    }
}

impl fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("available_permits", &self.permits.available_permits())
            .finish_non_exhaustive()
    }
}

/// Handle to one in-flight resolution.
///
/// Awaiting it yields the batch. Dropping it before then cancels the task:
/// a pending lookup never starts and a running one is discarded.
#[derive(Debug)]
#[must_use = "dropping a ResolveTask cancels it"]
pub struct ResolveTask {
    rx: oneshot::Receiver<Result<ResolvedBatch, ResolveError>>,
    abort: AbortHandle,
    runtime: Handle,
    finished: bool,
}

/// Cancels a resolution whose [`ResolveTask`] was handed to
/// [`ResolveTask::on_complete`]. Dropping it does nothing.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    abort: AbortHandle,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.abort.abort();
    }
}

impl ResolveTask {
    /// Stop before the round trip if it has not started.
    pub fn cancel(&self) {
        self.abort.abort();
    }

    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            abort: self.abort.clone(),
        }
    }

    /// Run `continuation` on the simulation thread with the result, exactly
    /// once. A cancelled task reports [`ResolveError::Cancelled`].
    pub fn on_complete<F>(self, queue: &SyncHandle, continuation: F) -> CancelHandle
    where
        F: FnOnce(Result<ResolvedBatch, ResolveError>) + Send + 'static,
    {
        let handle = self.cancel_handle();
        let queue = queue.clone();
        let runtime = self.runtime.clone();
        let abort = self.abort.clone();
        runtime.spawn(async move {
            let result = self.await;
            queue.post(move || {
                // a cancel may land between the post and the drain
                let result = if abort.is_aborted() {
                    Err(ResolveError::Cancelled)
                } else {
                    result
                };
                continuation(result);
            });
        });
        handle
    }
}

impl Future for ResolveTask {
    type Output = Result<ResolvedBatch, ResolveError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let received = std::task::ready!(Pin::new(&mut self.rx).poll(cx));
        self.finished = true;
        Poll::Ready(match received {
            Ok(_) if self.abort.is_aborted() => Err(ResolveError::Cancelled),
            Ok(result) => result,
            Err(_dropped) => Err(ResolveError::Cancelled),
        })
    }
}

impl Drop for ResolveTask {
    fn drop(&mut self) {
        // a delivered result stays deliverable to on_complete continuations
        if !self.finished {
            self.abort.abort();
        }
    }
}
