//! Worker task: acquire the gate, do timed work, release on every path.
//!
//! A worker moves through `Created → Waiting → Working(step) → Releasing →
//! Done`, or ends `Cancelled` from `Waiting` (never admitted) or `Working`
//! (interrupted mid-step). Once admitted, the permit guard drops on every
//! exit from the work loop, so the release cannot be skipped.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::permit::{AcquireError, PermitGate};
use crate::progress::ProgressSender;
use crate::supervisor::WorkerSupervisor;

/// Identity of one worker task. Assigned sequentially at submission time,
/// never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub usize);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Worker lifecycle position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Created,
    Waiting,
    Working { step: u32 },
    Releasing,
    Done,
    Cancelled,
}

impl WorkerStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Waiting => "waiting",
            Self::Working { .. } => "working",
            Self::Releasing => "releasing",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }
}

/// A work step was interrupted before it finished.
#[derive(Debug, thiserror::Error)]
#[error("work step interrupted")]
pub struct StepInterrupted;

/// One unit of simulated work between progress signals.
///
/// The production implementation just sleeps; tests substitute instant or
/// always-interrupted variants.
#[async_trait::async_trait]
pub trait Work: Send + Sync + 'static {
    /// Perform one step. `Err` ends the worker's loop early; the permit is
    /// still released.
    async fn step(
        &self,
        id: WorkerId,
        step: u32,
        cancel: &CancellationToken,
    ) -> Result<(), StepInterrupted>;
}

/// Timed simulated work: each step suspends the calling task for a fixed
/// delay without blocking other workers.
pub struct TimedWork {
    delay: Duration,
}

impl TimedWork {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait::async_trait]
impl Work for TimedWork {
    async fn step(
        &self,
        _id: WorkerId,
        _step: u32,
        cancel: &CancellationToken,
    ) -> Result<(), StepInterrupted> {
        tokio::select! {
            _ = tokio::time::sleep(self.delay) => Ok(()),
            _ = cancel.cancelled() => Err(StepInterrupted),
        }
    }
}

/// How a worker ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// All steps ran and the permit was returned.
    Completed,
    /// Cancelled while waiting for a permit or mid-step.
    Cancelled,
}

/// Run one worker to completion against the shared gate.
pub async fn run_worker(
    id: WorkerId,
    gate: Arc<PermitGate>,
    work: Arc<dyn Work>,
    steps: u32,
    progress: ProgressSender,
    cancel: CancellationToken,
    supervisor: Arc<WorkerSupervisor>,
) -> WorkerOutcome {
    supervisor.update_status(id, WorkerStatus::Waiting);
    tracing::debug!(worker = %id, "waiting for a permit");

    let permit = match gate.acquire(&cancel).await {
        Ok(permit) => permit,
        Err(AcquireError::Cancelled) => {
            tracing::warn!(worker = %id, "cancelled while waiting for a permit");
            supervisor.update_status(id, WorkerStatus::Cancelled);
            return WorkerOutcome::Cancelled;
        }
    };

    tracing::debug!(worker = %id, slot = permit.slot(), "admitted");

    let mut interrupted = false;
    for step in 0..steps {
        supervisor.update_status(id, WorkerStatus::Working { step });

        if progress.send_step(id, step).is_err() {
            // Progress sink is gone; keep working, the demo output is
            // best-effort.
            tracing::debug!(worker = %id, step, "progress sink closed");
        }

        if work.step(id, step, &cancel).await.is_err() {
            tracing::warn!(worker = %id, step, "interrupted mid-step");
            interrupted = true;
            break;
        }
    }

    supervisor.update_status(id, WorkerStatus::Releasing);
    drop(permit);
    tracing::debug!(worker = %id, "released permit");

    let (status, outcome) = if interrupted {
        (WorkerStatus::Cancelled, WorkerOutcome::Cancelled)
    } else {
        (WorkerStatus::Done, WorkerOutcome::Completed)
    };
    supervisor.update_status(id, status);
    tracing::info!(worker = %id, status = status.as_str(), "worker finished");
    outcome
}
