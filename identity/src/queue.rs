//! Hand-off of work back to the simulation thread.
//!
//! Background tasks never touch regions directly. They post closures to a
//! [`SyncHandle`]; the thread that owns the world drains the [`SyncQueue`]
//! once per tick and runs them in order.

use tokio::sync::mpsc;

type Job = Box<dyn FnOnce() + Send>;

/// Receiving end, owned by the simulation thread.
#[derive(Debug)]
pub struct SyncQueue {
    tx: mpsc::UnboundedSender<Job>,
    rx: mpsc::UnboundedReceiver<Job>,
}

/// Sending end, cloned into background tasks.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    tx: mpsc::UnboundedSender<Job>,
}

impl SyncQueue {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    #[must_use]
    pub fn handle(&self) -> SyncHandle {
        SyncHandle {
            tx: self.tx.clone(),
        }
    }

    /// Run queued jobs, up to `budget`. Never blocks.
    pub fn drain(&mut self, budget: usize) -> usize {
        let mut count = 0;
        while count < budget {
            match self.rx.try_recv() {
                Ok(job) => {
                    job();
                    count += 1;
                }
                Err(mpsc::error::TryRecvError::Empty | mpsc::error::TryRecvError::Disconnected) => {
                    break;
                }
            }
        }
        count
    }
}

impl Default for SyncQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncHandle {
    /// Queue `job`. Returns `false` if the queue is gone, in which case the
    /// job is dropped without running.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) -> bool {
        let posted = self.tx.send(Box::new(job)).is_ok();
        if !posted {
            tracing::debug!("Simulation queue closed; job dropped");
        }
        posted
    }
}
