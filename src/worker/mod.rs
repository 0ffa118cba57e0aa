//! Job execution.
//!
//! - [`WorkerPool`]: fixed set of tokio tasks pulling job IDs off the work queue
//! - [`ExecutionPolicy`]: decides how an attempt plays out
//!
//! # Execution Flow
//!
//! 1. A worker receives a job ID from the queue
//! 2. `enqueued -> running`, skipped if the job has moved on
//! 3. [`ExecutionPolicy::execute`] races the job timeout
//! 4. `running -> done`, or `running -> queued | failed` through the retry cap
//!
//! The registry lock is only held for steps 2 and 4, never while executing.

pub mod executor;
pub mod pool;

pub use executor::{ExecutionOutcome, ExecutionPolicy, FixedExecution, SimulatedExecution};
pub use pool::WorkerPool;
