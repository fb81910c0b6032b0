//! Worker lifecycle registry.
//!
//! Tracks each worker's state-machine position with lock-free concurrent
//! access, and hands out handles for waiting, state queries, and
//! cancellation. Entries stay in the registry after the worker finishes so a
//! run can be summarized from its final states.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::worker::{WorkerId, WorkerStatus};

/// Worker state snapshot for callers.
#[derive(Debug, Clone)]
pub struct WorkerState {
    pub id: WorkerId,
    pub status: WorkerStatus,
    pub submitted_at: Instant,
    pub finished_at: Option<Instant>,
}

struct WorkerEntry {
    state: WorkerState,
    cancel_token: CancellationToken,
    completion: Arc<Notify>,
}

/// Handle to a submitted worker for waiting, state queries, and
/// cancellation.
pub struct WorkerHandle {
    id: WorkerId,
    completion: Arc<Notify>,
    cancel_token: CancellationToken,
    supervisor: Arc<WorkerSupervisor>,
}

impl WorkerHandle {
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Wait until the worker reaches a terminal state.
    pub async fn wait(&self) {
        let notified = self.completion.notified();
        tokio::pin!(notified);
        // Register before checking so a terminal transition between the
        // check and the await is not missed.
        notified.as_mut().enable();

        if self.is_terminal() {
            return;
        }
        notified.await;
    }

    pub fn state(&self) -> Option<WorkerState> {
        self.supervisor.get_state(self.id)
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_terminal(&self) -> bool {
        self.supervisor
            .get_state(self.id)
            .map(|s| s.status.is_terminal())
            .unwrap_or(true)
    }
}

/// Worker registry with lock-free concurrent access.
pub struct WorkerSupervisor {
    workers: DashMap<WorkerId, WorkerEntry>,
}

impl WorkerSupervisor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            workers: DashMap::new(),
        })
    }

    /// Register a worker and hand back its handle. The worker starts in
    /// `Created`; `run_worker` drives the transitions from there.
    pub fn submit(self: &Arc<Self>, id: WorkerId, cancel_token: CancellationToken) -> WorkerHandle {
        let completion = Arc::new(Notify::new());

        let entry = WorkerEntry {
            state: WorkerState {
                id,
                status: WorkerStatus::Created,
                submitted_at: Instant::now(),
                finished_at: None,
            },
            cancel_token: cancel_token.clone(),
            completion: Arc::clone(&completion),
        };

        self.workers.insert(id, entry);

        WorkerHandle {
            id,
            completion,
            cancel_token,
            supervisor: Arc::clone(self),
        }
    }

    pub fn update_status(&self, id: WorkerId, status: WorkerStatus) {
        if let Some(mut entry) = self.workers.get_mut(&id) {
            entry.state.status = status;

            if status.is_terminal() {
                entry.state.finished_at = Some(Instant::now());
                entry.completion.notify_waiters();
            }
        }
    }

    pub fn get_state(&self, id: WorkerId) -> Option<WorkerState> {
        self.workers.get(&id).map(|e| e.state.clone())
    }

    /// Cancel a worker by id. Returns false for unknown ids.
    pub fn cancel(&self, id: WorkerId) -> bool {
        if let Some(entry) = self.workers.get(&id) {
            entry.cancel_token.cancel();
            true
        } else {
            false
        }
    }

    /// Snapshot of every registered worker, in no particular order.
    pub fn states(&self) -> Vec<WorkerState> {
        self.workers.iter().map(|e| e.state.clone()).collect()
    }
}

impl Default for WorkerSupervisor {
    fn default() -> Self {
        Self {
            workers: DashMap::new(),
        }
    }
}
