use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use super::{JobStore, StoreError};
use crate::scheduler::Job;

/// Keeps the snapshot in memory. Saves can be made to fail on demand.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    snapshot: Mutex<Vec<Job>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot, as if it had been saved by an earlier run.
    pub fn with_jobs(jobs: Vec<Job>) -> Self {
        Self {
            snapshot: Mutex::new(jobs),
            ..Self::default()
        }
    }

    /// While set, every `save` returns [`StoreError::Rejected`] and the
    /// snapshot is left unchanged.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Vec<Job> {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl JobStore for MemoryJobStore {
    fn load(&self) -> Result<Vec<Job>, StoreError> {
        Ok(self.snapshot())
    }

    fn save(&self, jobs: &[Job]) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("injected save failure".to_string()));
        }
        *self
            .snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = jobs.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
