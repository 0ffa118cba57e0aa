//! Job state and the scheduling side of the system.
//!
//! - [`JobRegistry`]: the locked, persisted job collection
//! - [`Dispatcher`]: moves `queued` jobs onto the work queue by priority
//! - [`JobStats`]: per-status counts

pub mod dispatcher;
pub mod job;
pub mod registry;
pub mod stats;

pub use dispatcher::Dispatcher;
pub use job::{Job, JobId, JobStatus, DEFAULT_PRIORITY, MAX_PRIORITY, MIN_PRIORITY};
pub use registry::JobRegistry;
pub use stats::JobStats;
