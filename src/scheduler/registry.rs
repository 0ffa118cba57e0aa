use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Result, SchedulerError};
use crate::scheduler::job::{Job, JobId, JobStatus};
use crate::scheduler::stats::JobStats;
use crate::store::JobStore;

#[derive(Debug)]
struct RegistryState {
    /// Sorted by ID. IDs are assigned in increasing order, so appending keeps it sorted.
    jobs: Vec<Job>,
    next_id: JobId,
    /// Jobs left `enqueued` or `running` by a worker that could not persist
    /// its transition, paired with the status they were stranded in.
    stranded: Vec<(JobId, JobStatus)>,
}

impl RegistryState {
    fn position(&self, id: JobId) -> Result<usize> {
        self.jobs
            .binary_search_by_key(&id, |job| job.id)
            .map_err(|_| SchedulerError::JobNotFound(id))
    }
}

/// Authoritative in-memory job collection.
///
/// Every operation takes the same lock for its whole duration. Mutations are
/// applied to a staged copy, written through the [`JobStore`], and only then
/// swapped in: a failed save leaves the visible state untouched.
///
/// The lock is never held across job execution; workers only take it for the
/// status transitions that bracket an attempt.
pub struct JobRegistry {
    state: Mutex<RegistryState>,
    store: Arc<dyn JobStore>,
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl JobRegistry {
    /// Load the snapshot from `store` and derive the next ID from it.
    ///
    /// Jobs persisted as `enqueued` or `running` belonged to a queue that no
    /// longer exists, so they are put back to `queued` (retries untouched).
    pub fn open(store: Arc<dyn JobStore>) -> Result<Self> {
        let mut jobs = store.load()?;
        jobs.sort_by_key(|job| job.id);
        let before = jobs.len();
        jobs.dedup_by_key(|job| job.id);
        if jobs.len() != before {
            tracing::warn!(
                dropped = before - jobs.len(),
                "Snapshot contained duplicate job IDs, keeping the first of each"
            );
        }

        let next_id = match jobs.last() {
            None => 1,
            Some(job) => job.id.checked_add(1).ok_or_else(|| {
                SchedulerError::Internal(format!(
                    "job ID space exhausted, snapshot already holds ID {}",
                    job.id
                ))
            })?,
        };
        tracing::info!(jobs = jobs.len(), next_id, "Job registry loaded");

        let registry = Self {
            state: Mutex::new(RegistryState {
                jobs,
                next_id,
                stranded: Vec::new(),
            }),
            store,
        };

        let recovered = registry.reset_matching(|status| {
            matches!(status, JobStatus::Enqueued | JobStatus::Running)
        })?;
        if recovered > 0 {
            tracing::warn!(
                recovered,
                "Re-queued jobs that were in flight when the previous run stopped"
            );
        }

        Ok(registry)
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // State is only replaced after a successful save, so it is consistent
        // even if a holder panicked.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn commit(&self, state: &mut RegistryState, staged: Vec<Job>) -> Result<()> {
        self.store.save(&staged)?;
        state.jobs = staged;
        Ok(())
    }

    pub fn create(&self, title: String, description: String, priority: i64) -> Result<Job> {
        let mut state = self.lock();
        let next_id = state
            .next_id
            .checked_add(1)
            .ok_or_else(|| SchedulerError::Internal("job ID space exhausted".to_string()))?;
        let job = Job::new(state.next_id, title, description, priority);

        let mut staged = state.jobs.clone();
        staged.push(job.clone());
        self.commit(&mut state, staged)?;
        state.next_id = next_id;

        tracing::info!(job_id = job.id, priority = job.priority, title = %job.title, "Job created");
        Ok(job)
    }

    pub fn get(&self, id: JobId) -> Result<Job> {
        let state = self.lock();
        let idx = state.position(id)?;
        Ok(state.jobs[idx].clone())
    }

    /// All jobs ordered by ID.
    pub fn list(&self) -> Vec<Job> {
        self.lock().jobs.clone()
    }

    /// Set a job's status unconditionally.
    ///
    /// This is the administrative override: it ignores the scheduling state
    /// machine, so it can for example re-queue a `failed` job or mark a
    /// `running` one `done` while a worker is still executing it.
    pub fn update_status(&self, id: JobId, status: JobStatus) -> Result<Job> {
        let mut state = self.lock();
        let idx = state.position(id)?;

        let mut staged = state.jobs.clone();
        let previous = staged[idx].status;
        staged[idx].set_status(status);
        let job = staged[idx].clone();
        self.commit(&mut state, staged)?;

        tracing::info!(job_id = id, from = %previous, to = %status, "Job status overridden");
        Ok(job)
    }

    /// Apply `mutate` to job `id` only if it is still in `expected` status.
    ///
    /// Returns `Ok(None)` without touching anything when the job has moved to
    /// another status. This check-and-set is what guarantees a job is
    /// dispatched and executed at most once per queued cycle.
    pub fn transition<F>(&self, id: JobId, expected: JobStatus, mutate: F) -> Result<Option<Job>>
    where
        F: FnOnce(&mut Job),
    {
        let mut state = self.lock();
        let idx = state.position(id)?;
        if state.jobs[idx].status != expected {
            tracing::debug!(
                job_id = id,
                expected = %expected,
                actual = %state.jobs[idx].status,
                "Skipping transition, job moved on"
            );
            return Ok(None);
        }

        let mut staged = state.jobs.clone();
        mutate(&mut staged[idx]);
        let job = staged[idx].clone();
        self.commit(&mut state, staged)?;

        tracing::debug!(job_id = id, from = %expected, to = %job.status, "Job transitioned");
        Ok(Some(job))
    }

    /// Move `queued` jobs to `enqueued` in dispatch order.
    ///
    /// Jobs are visited by ascending priority, then ascending ID. `reserve` is
    /// called once per candidate and returns a slot to hand the job off
    /// through; the scan stops at the first `None`. All reserved jobs are
    /// persisted in a single snapshot, and the slots are returned paired with
    /// their job IDs only if that save succeeds.
    pub fn enqueue_queued<P, R>(&self, mut reserve: R) -> Result<Vec<(JobId, P)>>
    where
        R: FnMut() -> Option<P>,
    {
        let mut state = self.lock();

        let mut candidates: Vec<usize> = state
            .jobs
            .iter()
            .enumerate()
            .filter(|(_, job)| job.status == JobStatus::Queued)
            .map(|(idx, _)| idx)
            .collect();
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        candidates.sort_by_key(|&idx| (state.jobs[idx].priority, state.jobs[idx].id));

        let mut reserved = Vec::new();
        for idx in candidates {
            match reserve() {
                Some(slot) => reserved.push((idx, slot)),
                None => break,
            }
        }
        if reserved.is_empty() {
            return Ok(Vec::new());
        }

        let mut staged = state.jobs.clone();
        for (idx, _) in &reserved {
            staged[*idx].set_status(JobStatus::Enqueued);
        }
        self.commit(&mut state, staged)?;

        Ok(reserved
            .into_iter()
            .map(|(idx, slot)| (state.jobs[idx].id, slot))
            .collect())
    }

    /// Put every `enqueued` job back to `queued`. Used once the workers have
    /// stopped and the work queue has been dropped.
    pub fn requeue_stranded(&self) -> Result<usize> {
        self.reset_matching(|status| status == JobStatus::Enqueued)
    }

    /// Remember that job `id` was left in `status` with no worker owning it.
    ///
    /// Only in-memory bookkeeping: the next [`recover_stranded`] call puts the
    /// job back to `queued` once the store accepts writes again.
    ///
    /// [`recover_stranded`]: JobRegistry::recover_stranded
    pub fn mark_stranded(&self, id: JobId, status: JobStatus) {
        let mut state = self.lock();
        if !state.stranded.contains(&(id, status)) {
            state.stranded.push((id, status));
        }
        tracing::warn!(job_id = id, status = %status, "Job stranded, will re-queue on next dispatch");
    }

    /// Re-queue jobs recorded by [`mark_stranded`](JobRegistry::mark_stranded).
    ///
    /// Entries whose job has since moved to another status are dropped
    /// without changes. On a failed save the entries are kept for the next
    /// call. Retries are left untouched.
    pub fn recover_stranded(&self) -> Result<usize> {
        let mut state = self.lock();
        if state.stranded.is_empty() {
            return Ok(0);
        }

        let mut staged = state.jobs.clone();
        let mut recovered = Vec::new();
        for &(id, status) in &state.stranded {
            if let Ok(idx) = state.position(id) {
                if staged[idx].status == status {
                    staged[idx].set_status(JobStatus::Queued);
                    recovered.push(id);
                }
            }
        }
        if !recovered.is_empty() {
            self.commit(&mut state, staged)?;
        }
        state.stranded.clear();

        for &job_id in &recovered {
            tracing::info!(job_id, "Stranded job re-queued");
        }
        Ok(recovered.len())
    }

    fn reset_matching(&self, matches: impl Fn(JobStatus) -> bool) -> Result<usize> {
        let mut state = self.lock();
        let mut staged = state.jobs.clone();
        let mut reset = 0;
        for job in staged.iter_mut().filter(|job| matches(job.status)) {
            job.set_status(JobStatus::Queued);
            reset += 1;
        }
        if reset > 0 {
            self.commit(&mut state, staged)?;
        }
        Ok(reset)
    }

    pub fn stats(&self) -> JobStats {
        JobStats::from_jobs(&self.lock().jobs)
    }

    /// The ID the next created job will receive.
    pub fn next_id(&self) -> JobId {
        self.lock().next_id
    }
}
