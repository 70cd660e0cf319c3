use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use titan_queue::{
    Job, JobQueue, JobStatus, JobWorker, LeaderElection, MemoryLeaseStore, RetryPolicy,
    TaskHandler, WorkerConfig,
};

fn fast_retry_queue() -> Arc<JobQueue> {
    Arc::new(JobQueue::with_retry_policy(RetryPolicy {
        base_delay: Duration::from_millis(10),
        factor: 2,
        max_delay: Duration::from_millis(80),
        jitter: 0.1,
    }))
}

fn test_job(task: &str) -> Job {
    Job::new(task, json!({"n": 1}), "test_tenant")
}

/// A1. Claim moves pending -> processing atomically
#[test]
fn claim_is_atomic_and_increments_attempts() {
    let queue = JobQueue::new();
    let job_id = queue.submit(test_job("echo"));

    let claimed = queue.claim().expect("one job eligible");
    assert_eq!(claimed.id, job_id);
    assert_eq!(claimed.status, JobStatus::Running);
    assert_eq!(claimed.attempts, 1);
    assert!(claimed.started_at.is_some());

    // nothing else is claimable
    assert!(queue.claim().is_none());
    let stats = queue.stats();
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.processing, 1);
}

/// A2. Priority: higher values served first, FIFO within a priority
#[test]
fn higher_priority_is_served_first() {
    let queue = JobQueue::new();
    let low = queue.submit(test_job("low").with_priority(0));
    let high = queue.submit(test_job("high").with_priority(10));
    let low_second = queue.submit(test_job("low2").with_priority(0));

    assert_eq!(queue.claim().unwrap().id, high);
    assert_eq!(queue.claim().unwrap().id, low);
    assert_eq!(queue.claim().unwrap().id, low_second);
}

/// A3. Completion is terminal and monotone
#[test]
fn completed_jobs_never_run_again() {
    let queue = JobQueue::new();
    let job_id = queue.submit(test_job("echo"));
    let claimed = queue.claim().unwrap();
    queue.complete(&claimed.id, Some(json!({"ok": true}))).unwrap();

    let job = queue.get(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.completed_at.is_some());
    assert!(queue.claim().is_none());
    // no transition out of COMPLETED
    assert!(queue.cancel(&job_id).is_err());
}

/// A4. Retry with backoff, then DLQ after max_retries attempts
#[tokio::test]
async fn failing_job_reaches_dead_after_max_retries() {
    let queue = fast_retry_queue();
    let job_id = queue.submit(test_job("always_fails").with_max_retries(3));

    for attempt in 1..=3 {
        // wait out the backoff window
        let mut claimed = None;
        for _ in 0..60 {
            claimed = queue.claim();
            if claimed.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let claimed = claimed.expect("job becomes eligible again");
        assert_eq!(claimed.attempts, attempt);

        let status = queue.fail(&claimed.id, "boom", true).unwrap();
        if attempt < 3 {
            assert_eq!(status, JobStatus::Pending);
            let job = queue.get(&job_id).unwrap();
            // backoff pushed eligibility into the future
            assert!(job.run_at > job.created_at);
        } else {
            assert_eq!(status, JobStatus::Dead);
        }
    }

    let job = queue.get(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::Dead);
    assert_eq!(job.error.as_deref(), Some("boom"));
    assert_eq!(queue.dead_letters().len(), 1);
    assert_eq!(queue.stats().dlq, 1);
}

/// A5. Backoff roughly doubles between attempts
#[test]
fn retry_backoff_doubles_up_to_cap() {
    let policy = RetryPolicy {
        jitter: 0.0,
        ..RetryPolicy::default()
    };
    let delays: Vec<u64> = (1..=8).map(|a| policy.backoff(a).as_secs()).collect();
    assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 60, 60]);
}

/// A6. Cancellation allowed only from PENDING or RUNNING
#[test]
fn cancel_semantics() {
    let queue = JobQueue::new();

    let pending = queue.submit(test_job("a"));
    queue.cancel(&pending).unwrap();
    assert_eq!(queue.get(&pending).unwrap().status, JobStatus::Cancelled);

    let running = queue.submit(test_job("b"));
    let claimed = queue.claim().unwrap();
    assert_eq!(claimed.id, running);
    queue.cancel(&running).unwrap();
    assert_eq!(queue.get(&running).unwrap().status, JobStatus::Cancelled);

    // cancel-wins: the late completion is discarded
    assert!(queue.complete(&running, None).is_err());
    assert_eq!(queue.get(&running).unwrap().status, JobStatus::Cancelled);
}

struct Echo;
struct AlwaysFails;
struct Counting(AtomicU32);

#[async_trait]
impl TaskHandler for Echo {
    async fn handle(&self, job: Job) -> Result<Option<Value>, String> {
        Ok(Some(job.payload))
    }
}

#[async_trait]
impl TaskHandler for AlwaysFails {
    async fn handle(&self, _job: Job) -> Result<Option<Value>, String> {
        Err("handler raised".to_string())
    }
}

#[async_trait]
impl TaskHandler for Counting {
    async fn handle(&self, _job: Job) -> Result<Option<Value>, String> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }
}

fn worker_config() -> WorkerConfig {
    WorkerConfig {
        name: "test".to_string(),
        poll_interval: Duration::from_millis(10),
        max_in_flight: 2,
    }
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

/// B1. Worker processes jobs via registered handlers
#[tokio::test]
async fn worker_runs_registered_handler() {
    let queue = Arc::new(JobQueue::new());
    let job_id = queue.submit(test_job("echo"));

    let handle = JobWorker::new(queue.clone(), worker_config())
        .register_handler("echo", Arc::new(Echo))
        .start();

    wait_for(|| {
        queue
            .get(&job_id)
            .map(|j| j.status == JobStatus::Completed)
            .unwrap_or(false)
    })
    .await;

    let job = queue.get(&job_id).unwrap();
    assert_eq!(job.result, Some(json!({"n": 1})));
    handle.shutdown().await;
}

/// B2. Unknown tasks fail with no retry
#[tokio::test]
async fn unknown_task_goes_straight_to_dlq() {
    let queue = Arc::new(JobQueue::new());
    let job_id = queue.submit(test_job("no_such_task"));

    let handle = JobWorker::new(queue.clone(), worker_config())
        .register_handler("echo", Arc::new(Echo))
        .start();

    wait_for(|| {
        queue
            .get(&job_id)
            .map(|j| j.status == JobStatus::Dead)
            .unwrap_or(false)
    })
    .await;

    let job = queue.get(&job_id).unwrap();
    assert_eq!(job.attempts, 1);
    assert!(job.error.unwrap().contains("unknown task"));
    handle.shutdown().await;
}

/// B3. Handler errors retry until DEAD
#[tokio::test]
async fn worker_retries_failing_handler_to_death() {
    let queue = fast_retry_queue();
    let job_id = queue.submit(test_job("always_fails").with_max_retries(2));

    let handle = JobWorker::new(queue.clone(), worker_config())
        .register_handler("always_fails", Arc::new(AlwaysFails))
        .start();

    wait_for(|| {
        queue
            .get(&job_id)
            .map(|j| j.status == JobStatus::Dead)
            .unwrap_or(false)
    })
    .await;

    let job = queue.get(&job_id).unwrap();
    assert_eq!(job.attempts, 2);
    assert_eq!(job.error.as_deref(), Some("handler raised"));
    handle.shutdown().await;
}

/// B4. Singleton worker: only the leader processes
#[tokio::test]
async fn non_leader_worker_stands_by() {
    let queue = Arc::new(JobQueue::new());
    let store: Arc<dyn titan_queue::LeaseStore> = Arc::new(MemoryLeaseStore::new());

    // another instance already holds the lease
    let held = store
        .try_acquire("federation_sync", "other-node", Duration::from_secs(30))
        .await;
    assert!(held.is_some());

    let election = LeaderElection::new(
        store.clone(),
        "federation_sync",
        "this-node",
        Duration::from_millis(100),
    );
    election.start();

    let counter = Arc::new(Counting(AtomicU32::new(0)));
    let handler: Arc<dyn TaskHandler> = counter.clone();
    let handle = JobWorker::new(queue.clone(), worker_config())
        .register_handler("count", handler)
        .with_leader_election(election.clone())
        .start();

    queue.submit(test_job("count"));
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(counter.0.load(Ordering::SeqCst), 0, "non-leader must not process");
    assert_eq!(queue.stats().pending, 1);

    handle.shutdown().await;
    election.stop().await;
}
