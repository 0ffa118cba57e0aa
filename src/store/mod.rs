//! Snapshot persistence for the job collection.
//!
//! The registry writes the *whole* collection on every mutation, so a store
//! only has to support two operations: load the last snapshot and replace it.
//!
//! - [`FileJobStore`]: JSON file, replaced atomically (temp file + rename)
//! - [`MemoryJobStore`]: in-process snapshot with failure injection

mod file;
mod memory;

use std::path::PathBuf;

use thiserror::Error;

use crate::scheduler::Job;

pub use file::FileJobStore;
pub use memory::MemoryJobStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode snapshot: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Snapshot write rejected: {0}")]
    Rejected(String),
}

/// Full-snapshot persistence for jobs.
pub trait JobStore: Send + Sync {
    /// Load the last saved snapshot. A store that has never been written
    /// returns an empty collection.
    fn load(&self) -> Result<Vec<Job>, StoreError>;

    /// Replace the snapshot with `jobs`.
    fn save(&self, jobs: &[Job]) -> Result<(), StoreError>;
}
