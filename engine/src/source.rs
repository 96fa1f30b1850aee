//! Who issued a command and where replies go.

use std::fmt;
use std::sync::Arc;

use bulwark_types::Actor;

/// Delivers messages to a command sender.
pub trait MessageSink: Send + Sync {
    fn send(&self, message: &str);
}

/// A command sender: a player, or the console when `actor` is `None`.
///
/// The console bypasses permission and quota checks.
#[derive(Clone)]
pub struct CommandSource {
    pub actor: Option<Actor>,
    pub sink: Arc<dyn MessageSink>,
}

impl CommandSource {
    #[must_use]
    pub fn console(sink: Arc<dyn MessageSink>) -> Self {
        Self { actor: None, sink }
    }

    #[must_use]
    pub fn player(actor: Actor, sink: Arc<dyn MessageSink>) -> Self {
        Self {
            actor: Some(actor),
            sink,
        }
    }

    pub fn send(&self, message: &str) {
        self.sink.send(message);
    }

    /// Name used in task listings and logs.
    #[must_use]
    pub fn owner_name(&self) -> String {
        match &self.actor {
            Some(actor) => actor.principal().to_string(),
            None => "*CONSOLE*".to_owned(),
        }
    }
}

impl fmt::Debug for CommandSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSource")
            .field("actor", &self.actor)
            .finish_non_exhaustive()
    }
}
