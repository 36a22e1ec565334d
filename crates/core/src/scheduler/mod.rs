//! Job scheduler: the queue of conversion and merge jobs.
//!
//! Jobs move through a small state machine:
//! - **Pending**: queued, editable, not running
//! - **InProgress**: one execution owns the job; edits are rejected
//! - **Completed / Failed / Cancelled**: terminal until reset or removed
//!
//! Every started job runs in its own task. The scheduler only reacts to the
//! events its executions emit, so one slow or failing job never holds up
//! another.

mod runner;
mod types;

pub use runner::Scheduler;
pub use types::{
    JobChange, JobUpdate, JobWatcher, OutputLocation, SchedulerError, SchedulerStatus,
};
