//! jobscope: a single-node priority job scheduler.
//!
//! Jobs are created `queued`, dispatched onto a bounded work queue in
//! priority order, executed by a fixed worker pool under a timeout, and
//! retried until a cap is hit. Every state change is persisted as a full
//! snapshot before it becomes visible.

pub mod api;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod service;
pub mod shutdown;
pub mod store;
pub mod worker;

pub use error::{Result, SchedulerError};
pub use service::JobService;
