//! Registry of background command tasks, for status listings.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub id: u64,
    pub description: String,
    pub owner: String,
    pub started: Instant,
}

#[derive(Debug, Default)]
struct SupervisorState {
    next_id: u64,
    tasks: BTreeMap<u64, TaskInfo>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskSupervisor {
    state: Arc<Mutex<SupervisorState>>,
}

/// Keeps a task listed until dropped.
#[derive(Debug)]
#[must_use = "the task is unlisted as soon as the guard is dropped"]
pub struct TaskGuard {
    id: u64,
    state: Arc<Mutex<SupervisorState>>,
}

impl TaskSupervisor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, description: impl Into<String>, owner: impl Into<String>) -> TaskGuard {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        let info = TaskInfo {
            id,
            description: description.into(),
            owner: owner.into(),
            started: Instant::now(),
        };
        tracing::debug!(task = id, description = %info.description, owner = %info.owner, "Task registered");
        state.tasks.insert(id, info);
        TaskGuard {
            id,
            state: Arc::clone(&self.state),
        }
    }

    /// Running tasks, oldest first.
    #[must_use]
    pub fn tasks(&self) -> Vec<TaskInfo> {
        self.state.lock().tasks.values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TaskGuard {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.state.lock().tasks.remove(&self.id);
    }
}
