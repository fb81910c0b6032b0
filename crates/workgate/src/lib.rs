//! workgate: permit-bounded concurrent admission demo.
//!
//! A fixed pool of workers contends for a smaller number of permits on one
//! shared gate. Admitted workers perform timed work steps; when a worker's
//! permit guard drops, the next waiter is admitted.

mod config;
mod supervisor;

pub mod dispatcher;
pub mod permit;
pub mod progress;
pub mod worker;

pub use config::{ConfigError, RunConfig};
pub use dispatcher::{Dispatcher, RunReport};
pub use permit::{AcquireError, GateError, Permit, PermitGate};
pub use progress::{ProgressEvent, ProgressSender};
pub use supervisor::{WorkerHandle, WorkerState, WorkerSupervisor};
pub use worker::{
    StepInterrupted, TimedWork, Work, WorkerId, WorkerOutcome, WorkerStatus, run_worker,
};
