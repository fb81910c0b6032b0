//! Run coordination: build the gate, submit workers, bound the wait.
//!
//! Worker ids are assigned sequentially on the dispatching task before
//! anything is spawned, so id assignment involves no shared mutable state.
//! When the overall timeout elapses the dispatcher stops waiting and reports
//! the outstanding workers; their tasks are left running, matching the
//! stop-waiting semantics of the original demo.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigError, RunConfig};
use crate::permit::{GateError, PermitGate};
use crate::progress::ProgressSender;
use crate::supervisor::WorkerSupervisor;
use crate::worker::{TimedWork, Work, WorkerId, WorkerStatus, run_worker};

/// Summary of one dispatcher run, by worker id.
#[derive(Debug)]
pub struct RunReport {
    pub completed: Vec<WorkerId>,
    pub cancelled: Vec<WorkerId>,
    /// Workers still running when the dispatcher stopped waiting.
    pub outstanding: Vec<WorkerId>,
    pub timed_out: bool,
    pub elapsed: Duration,
}

pub struct Dispatcher {
    config: RunConfig,
    work: Arc<dyn Work>,
    run_cancel: CancellationToken,
}

impl Dispatcher {
    /// Dispatcher with timed simulated work, the demo behavior.
    pub fn new(config: RunConfig) -> Result<Self, ConfigError> {
        let delay = config.step_delay;
        Self::with_work(config, Arc::new(TimedWork::new(delay)))
    }

    /// Extension point for a different work implementation.
    pub fn with_work(config: RunConfig, work: Arc<dyn Work>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            work,
            run_cancel: CancellationToken::new(),
        })
    }

    /// Cancel the whole run: every worker's token is a child of the run
    /// token, so this fans out to waiters and admitted workers alike.
    pub fn cancel(&self) {
        self.run_cancel.cancel();
    }

    /// Run the configured number of workers against one shared gate and
    /// wait for them, bounded by the overall timeout.
    pub async fn run(&self, progress: ProgressSender) -> Result<RunReport, GateError> {
        let gate = PermitGate::new(self.config.permit_capacity)?;
        let supervisor = WorkerSupervisor::new();

        tracing::info!(
            workers = self.config.pool_size,
            permits = self.config.permit_capacity,
            steps = self.config.steps_per_worker,
            "starting run"
        );

        let started = Instant::now();
        let mut tasks = Vec::with_capacity(self.config.pool_size);
        for index in 0..self.config.pool_size {
            let id = WorkerId(index);
            let cancel = self.run_cancel.child_token();
            supervisor.submit(id, cancel.clone());

            tasks.push(tokio::spawn(run_worker(
                id,
                Arc::clone(&gate),
                Arc::clone(&self.work),
                self.config.steps_per_worker,
                progress.clone(),
                cancel,
                Arc::clone(&supervisor),
            )));
        }
        // Workers hold their own clones; dropping ours lets the progress
        // channel close once the last worker finishes.
        drop(progress);

        let timed_out =
            match tokio::time::timeout(self.config.overall_timeout, join_all(tasks)).await {
                Ok(results) => {
                    for result in results {
                        if let Err(e) = result {
                            tracing::error!(error = %e, "worker task failed to join");
                        }
                    }
                    false
                }
                Err(_) => {
                    tracing::warn!(
                        timeout = ?self.config.overall_timeout,
                        "gave up waiting; outstanding workers keep running"
                    );
                    true
                }
            };

        let mut report = RunReport {
            completed: Vec::new(),
            cancelled: Vec::new(),
            outstanding: Vec::new(),
            timed_out,
            elapsed: started.elapsed(),
        };

        let mut states = supervisor.states();
        states.sort_by_key(|s| s.id);
        for state in states {
            match state.status {
                WorkerStatus::Done => report.completed.push(state.id),
                WorkerStatus::Cancelled => report.cancelled.push(state.id),
                _ => report.outstanding.push(state.id),
            }
        }

        if !report.outstanding.is_empty() {
            tracing::warn!(
                outstanding = ?report.outstanding,
                "run ended with workers still active"
            );
        }

        Ok(report)
    }
}
