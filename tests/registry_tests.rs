
use std::sync::Arc;

use jobscope::scheduler::{Job, JobRegistry, JobStatus, DEFAULT_PRIORITY};
use jobscope::store::{FileJobStore, JobStore, MemoryJobStore};
use jobscope::SchedulerError;
use tempfile::TempDir;
use test_harness::{memory_registry, seeded_registry};

fn job_with(id: u64, status: JobStatus, priority: i64, retries: u32) -> Job {
    let mut job = Job::new(id, format!("job-{}", id), String::new(), priority);
    job.status = status;
    job.retries = retries;
    job
}

#[test]
fn test_create_assigns_increasing_ids() {
    let (_store, registry) = memory_registry();

    let ids: Vec<u64> = (0..5)
        .map(|i| {
            registry
                .create(format!("job {}", i), String::new(), 3)
                .unwrap()
                .id
        })
        .collect();

    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    assert_eq!(registry.next_id(), 6);
}

#[test]
fn test_create_sets_initial_state() {
    let (_store, registry) = memory_registry();

    let job = registry
        .create("backup".to_string(), "nightly db dump".to_string(), 2)
        .unwrap();

    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.retries, 0);
    assert_eq!(job.priority, 2);
    assert_eq!(job.title, "backup");
    assert_eq!(job.description, "nightly db dump");
    assert_eq!(registry.get(job.id).unwrap(), job);
}

#[test]
fn test_create_keeps_valid_priorities_and_clamps_others() {
    let (_store, registry) = memory_registry();

    for p in 1..=5 {
        let job = registry.create("p".to_string(), String::new(), p).unwrap();
        assert_eq!(job.priority as i64, p);
    }
    for p in [0, 6, -3, 42] {
        let job = registry.create("p".to_string(), String::new(), p).unwrap();
        assert_eq!(job.priority, DEFAULT_PRIORITY, "priority {} should clamp", p);
    }
}

#[test]
fn test_get_unknown_job_is_not_found() {
    let (_store, registry) = memory_registry();
    registry.create("only".to_string(), String::new(), 3).unwrap();

    let err = registry.get(99).unwrap_err();
    assert!(matches!(err, SchedulerError::JobNotFound(99)));
}

#[test]
fn test_list_is_ordered_by_id() {
    let (_store, registry) = memory_registry();
    for p in [5, 1, 3] {
        registry.create("j".to_string(), String::new(), p).unwrap();
    }

    let ids: Vec<u64> = registry.list().iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn test_update_status_overrides_any_state() {
    let (_store, registry) = memory_registry();
    let job = registry.create("j".to_string(), String::new(), 3).unwrap();

    let done = registry.update_status(job.id, JobStatus::Done).unwrap();
    assert_eq!(done.status, JobStatus::Done);
    assert!(done.updated_at >= job.updated_at);

    // Terminal states can be reset by the override
    let requeued = registry.update_status(job.id, JobStatus::Queued).unwrap();
    assert_eq!(requeued.status, JobStatus::Queued);
    assert_eq!(registry.get(job.id).unwrap().status, JobStatus::Queued);
}

#[test]
fn test_update_status_unknown_job_is_not_found() {
    let (_store, registry) = memory_registry();
    let err = registry.update_status(7, JobStatus::Done).unwrap_err();
    assert!(matches!(err, SchedulerError::JobNotFound(7)));
}

#[test]
fn test_every_mutation_is_persisted() {
    let (store, registry) = memory_registry();

    let a = registry.create("a".to_string(), String::new(), 1).unwrap();
    registry.create("b".to_string(), String::new(), 2).unwrap();
    registry.update_status(a.id, JobStatus::Failed).unwrap();

    assert_eq!(store.save_count(), 3);
    assert_eq!(store.snapshot(), registry.list());
}

#[test]
fn test_failed_save_leaves_state_untouched() {
    let (store, registry) = memory_registry();
    let job = registry.create("kept".to_string(), String::new(), 3).unwrap();

    store.fail_saves(true);

    let err = registry
        .create("lost".to_string(), String::new(), 3)
        .unwrap_err();
    assert!(matches!(err, SchedulerError::Persistence(_)));
    assert!(registry
        .update_status(job.id, JobStatus::Done)
        .is_err());
    assert!(registry
        .transition(job.id, JobStatus::Queued, |j| j.set_status(JobStatus::Enqueued))
        .is_err());

    assert_eq!(registry.list(), vec![job.clone()]);
    assert_eq!(registry.next_id(), 2);

    store.fail_saves(false);
    let next = registry.create("next".to_string(), String::new(), 3).unwrap();
    assert_eq!(next.id, 2, "failed create must not consume an ID");
}

#[test]
fn test_transition_only_applies_in_expected_state() {
    let (_store, registry) = memory_registry();
    let job = registry.create("j".to_string(), String::new(), 3).unwrap();

    let skipped = registry
        .transition(job.id, JobStatus::Running, |j| j.set_status(JobStatus::Done))
        .unwrap();
    assert!(skipped.is_none());
    assert_eq!(registry.get(job.id).unwrap().status, JobStatus::Queued);

    let moved = registry
        .transition(job.id, JobStatus::Queued, |j| j.set_status(JobStatus::Enqueued))
        .unwrap()
        .unwrap();
    assert_eq!(moved.status, JobStatus::Enqueued);

    // A second claim of the same queued cycle loses
    let again = registry
        .transition(job.id, JobStatus::Queued, |j| j.set_status(JobStatus::Enqueued))
        .unwrap();
    assert!(again.is_none());
}

#[test]
fn test_transition_unknown_job_is_not_found() {
    let (_store, registry) = memory_registry();
    let err = registry
        .transition(3, JobStatus::Queued, |_| {})
        .unwrap_err();
    assert!(matches!(err, SchedulerError::JobNotFound(3)));
}

#[test]
fn test_enqueue_queued_orders_by_priority_then_id() {
    let (_store, registry) = seeded_registry(vec![
        job_with(1, JobStatus::Queued, 5, 0),
        job_with(2, JobStatus::Queued, 1, 0),
        job_with(3, JobStatus::Done, 1, 0),
        job_with(4, JobStatus::Queued, 3, 0),
        job_with(5, JobStatus::Queued, 1, 0),
    ]);

    let mut slots = 0..;
    let reserved = registry.enqueue_queued(|| slots.next()).unwrap();

    let order: Vec<u64> = reserved.iter().map(|(id, _)| *id).collect();
    assert_eq!(order, vec![2, 5, 4, 1]);
    for id in [1, 2, 4, 5] {
        assert_eq!(registry.get(id).unwrap().status, JobStatus::Enqueued);
    }
    assert_eq!(registry.get(3).unwrap().status, JobStatus::Done);
}

#[test]
fn test_enqueue_queued_stops_when_reserve_fails() {
    let (_store, registry) = memory_registry();
    for p in [3, 1, 2] {
        registry.create("j".to_string(), String::new(), p).unwrap();
    }

    let mut remaining = 2;
    let reserved = registry
        .enqueue_queued(|| {
            if remaining == 0 {
                return None;
            }
            remaining -= 1;
            Some(())
        })
        .unwrap();

    let ids: Vec<u64> = reserved.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![2, 3]);
    assert_eq!(registry.get(1).unwrap().status, JobStatus::Queued);
}

#[test]
fn test_enqueue_queued_failed_save_keeps_jobs_queued() {
    let (store, registry) = memory_registry();
    registry.create("j".to_string(), String::new(), 3).unwrap();
    store.fail_saves(true);

    let result = registry.enqueue_queued(|| Some(()));

    assert!(matches!(result, Err(SchedulerError::Persistence(_))));
    assert_eq!(registry.get(1).unwrap().status, JobStatus::Queued);
}

#[test]
fn test_open_requeues_in_flight_jobs() {
    let (store, registry) = seeded_registry(vec![
        job_with(1, JobStatus::Enqueued, 3, 0),
        job_with(2, JobStatus::Running, 2, 2),
        job_with(3, JobStatus::Done, 1, 0),
        job_with(4, JobStatus::Failed, 1, 4),
    ]);

    let statuses: Vec<(JobStatus, u32)> = registry
        .list()
        .iter()
        .map(|j| (j.status, j.retries))
        .collect();
    assert_eq!(
        statuses,
        vec![
            (JobStatus::Queued, 0),
            (JobStatus::Queued, 2),
            (JobStatus::Done, 0),
            (JobStatus::Failed, 4),
        ]
    );
    assert_eq!(store.snapshot(), registry.list());
}

#[test]
fn test_requeue_stranded_only_touches_enqueued() {
    let (_store, registry) = seeded_registry(vec![
        job_with(1, JobStatus::Queued, 3, 0),
        job_with(2, JobStatus::Queued, 3, 0),
    ]);
    registry
        .transition(1, JobStatus::Queued, |j| j.set_status(JobStatus::Enqueued))
        .unwrap();
    registry
        .transition(2, JobStatus::Queued, |j| j.set_status(JobStatus::Running))
        .unwrap();

    assert_eq!(registry.requeue_stranded().unwrap(), 1);
    assert_eq!(registry.get(1).unwrap().status, JobStatus::Queued);
    assert_eq!(registry.get(2).unwrap().status, JobStatus::Running);
}

#[test]
fn test_recover_stranded_requeues_only_unmoved_jobs() {
    let (store, registry) = seeded_registry(vec![
        job_with(1, JobStatus::Queued, 3, 1),
        job_with(2, JobStatus::Queued, 3, 0),
    ]);
    registry.update_status(1, JobStatus::Running).unwrap();
    registry.update_status(2, JobStatus::Enqueued).unwrap();
    registry.mark_stranded(1, JobStatus::Running);
    registry.mark_stranded(2, JobStatus::Enqueued);
    registry.mark_stranded(2, JobStatus::Enqueued);
    // Overridden after being stranded, so it must be left alone
    registry.update_status(2, JobStatus::Done).unwrap();

    store.fail_saves(true);
    assert!(matches!(
        registry.recover_stranded(),
        Err(SchedulerError::Persistence(_))
    ));
    assert_eq!(registry.get(1).unwrap().status, JobStatus::Running);

    store.fail_saves(false);
    assert_eq!(registry.recover_stranded().unwrap(), 1);
    let job = registry.get(1).unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.retries, 1);
    assert_eq!(registry.get(2).unwrap().status, JobStatus::Done);

    assert_eq!(registry.recover_stranded().unwrap(), 0);
}

#[test]
fn test_open_rejects_exhausted_id_space() {
    let store = Arc::new(MemoryJobStore::with_jobs(vec![job_with(
        u64::MAX,
        JobStatus::Done,
        3,
        0,
    )]));
    let result = JobRegistry::open(store);
    assert!(matches!(result, Err(SchedulerError::Internal(_))));
}

#[test]
fn test_stats_match_statuses() {
    let (_store, registry) = seeded_registry(vec![
        job_with(1, JobStatus::Queued, 3, 0),
        job_with(2, JobStatus::Done, 3, 0),
        job_with(3, JobStatus::Done, 3, 0),
        job_with(4, JobStatus::Failed, 3, 4),
    ]);
    registry
        .transition(1, JobStatus::Queued, |j| j.set_status(JobStatus::Running))
        .unwrap();

    let stats = registry.stats();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.queued, 0);
    assert_eq!(stats.enqueued, 0);
    assert_eq!(stats.running, 1);
    assert_eq!(stats.done, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(
        stats.queued + stats.enqueued + stats.running + stats.done + stats.failed,
        stats.total
    );
}

#[test]
fn test_ids_continue_after_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("jobs.json");

    {
        let registry = JobRegistry::open(Arc::new(FileJobStore::new(&path))).unwrap();
        for i in 0..3 {
            registry
                .create(format!("run-1 job {}", i), String::new(), 3)
                .unwrap();
        }
    }

    let registry = JobRegistry::open(Arc::new(FileJobStore::new(&path))).unwrap();
    assert_eq!(registry.list().len(), 3);
    let job = registry
        .create("run-2 job".to_string(), String::new(), 3)
        .unwrap();
    assert_eq!(job.id, 4);
}

#[test]
fn test_next_id_follows_max_loaded_id() {
    let (_store, registry) = seeded_registry(vec![
        job_with(9, JobStatus::Done, 3, 0),
        job_with(2, JobStatus::Done, 3, 0),
    ]);
    assert_eq!(registry.next_id(), 10);
    assert_eq!(
        registry
            .create("after gap".to_string(), String::new(), 3)
            .unwrap()
            .id,
        10
    );
}

#[test]
fn test_empty_store_starts_at_one() {
    let store = Arc::new(MemoryJobStore::new());
    let registry = JobRegistry::open(store.clone()).unwrap();
    assert_eq!(registry.next_id(), 1);
    // Nothing to recover, so opening does not write
    assert_eq!(store.save_count(), 0);
    assert!(store.load().unwrap().is_empty());
}
