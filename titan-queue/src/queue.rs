//! The job queue.
//!
//! Three logical sub-queues: `pending`, `processing` and `dlq`. A claim
//! atomically moves a job from pending to processing under one lock so
//! concurrent workers can never double-execute. Failures re-enqueue with
//! exponential backoff until retries are exhausted, then the job parks in
//! the DLQ as `DEAD`.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::types::{Job, JobId, JobStatus, RetryPolicy};

#[derive(Default)]
struct QueueState {
    jobs: HashMap<JobId, Job>,
    pending: Vec<JobId>,
    processing: Vec<JobId>,
    dlq: Vec<JobId>,
}

/// Point-in-time queue counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub processing: usize,
    pub dlq: usize,
    pub total: usize,
}

/// In-memory durable-semantics job queue.
pub struct JobQueue {
    state: Mutex<QueueState>,
    retry_policy: RetryPolicy,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::with_retry_policy(RetryPolicy::default())
    }

    pub fn with_retry_policy(retry_policy: RetryPolicy) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            retry_policy,
        }
    }

    /// Submit a job; it becomes `PENDING` in the pending sub-queue.
    pub fn submit(&self, job: Job) -> JobId {
        let job_id = job.id.clone();
        let mut state = self.state.lock();
        debug!(job_id = %job_id, task = %job.task, "job submitted");
        state.pending.push(job_id.clone());
        state.jobs.insert(job_id.clone(), job);
        job_id
    }

    /// Atomically claim the highest-priority eligible job.
    ///
    /// The claimed job moves `pending -> processing` and transitions to
    /// `RUNNING` with `attempts` incremented, all under one lock.
    pub fn claim(&self) -> Option<Job> {
        let now = Utc::now();
        let mut state = self.state.lock();

        let position = {
            let jobs = &state.jobs;
            state
                .pending
                .iter()
                .enumerate()
                .filter(|(_, id)| jobs.get(*id).map(|j| j.eligible(now)).unwrap_or(false))
                .max_by_key(|(_, id)| {
                    let job = &jobs[*id];
                    (job.priority, std::cmp::Reverse(job.created_at))
                })
                .map(|(position, _)| position)?
        };

        let job_id = state.pending.remove(position);
        state.processing.push(job_id.clone());
        let job = state.jobs.get_mut(&job_id)?;
        job.status = JobStatus::Running;
        job.started_at = Some(now);
        job.attempts += 1;
        debug!(job_id = %job_id, task = %job.task, attempt = job.attempts, "job claimed");
        Some(job.clone())
    }

    /// Complete a running job.
    pub fn complete(&self, job_id: &JobId, result: Option<Value>) -> QueueResult<()> {
        let mut state = self.state.lock();
        state.processing.retain(|id| id != job_id);
        let job = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| QueueError::JobNotFound(job_id.clone()))?;
        if job.status != JobStatus::Running {
            return Err(QueueError::invalid_transition(
                job_id.clone(),
                job.status,
                "complete",
            ));
        }
        job.status = JobStatus::Completed;
        job.completed_at = Some(Utc::now());
        job.result = result;
        debug!(job_id = %job_id, "job completed");
        Ok(())
    }

    /// Fail a running job.
    ///
    /// With retries left (and `retry` true) the job re-enters `pending`
    /// with exponential backoff; otherwise it parks in the DLQ as `DEAD`.
    pub fn fail(&self, job_id: &JobId, error: impl Into<String>, retry: bool) -> QueueResult<JobStatus> {
        let error = error.into();
        let mut state = self.state.lock();
        state.processing.retain(|id| id != job_id);
        let retry_policy = self.retry_policy.clone();
        let job = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| QueueError::JobNotFound(job_id.clone()))?;
        if job.status != JobStatus::Running {
            return Err(QueueError::invalid_transition(
                job_id.clone(),
                job.status,
                "fail",
            ));
        }
        job.error = Some(error.clone());

        let status = if retry && job.attempts < job.max_retries {
            let backoff = retry_policy.backoff(job.attempts);
            job.status = JobStatus::Pending;
            job.run_at = Utc::now()
                + chrono::Duration::from_std(backoff)
                    .unwrap_or_else(|_| chrono::Duration::seconds(60));
            warn!(job_id = %job_id, attempt = job.attempts, backoff_ms = backoff.as_millis() as u64,
                  %error, "job failed; retrying");
            state.pending.push(job_id.clone());
            JobStatus::Pending
        } else {
            job.status = JobStatus::Dead;
            job.completed_at = Some(Utc::now());
            warn!(job_id = %job_id, attempts = job.attempts, %error, "job moved to DLQ");
            state.dlq.push(job_id.clone());
            JobStatus::Dead
        };
        Ok(status)
    }

    /// Cancel a job; allowed only from `PENDING` or `RUNNING`.
    ///
    /// A running job keeps executing until its handler returns, but the
    /// cancel wins: the late completion is discarded.
    pub fn cancel(&self, job_id: &JobId) -> QueueResult<()> {
        let mut state = self.state.lock();
        let job = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| QueueError::JobNotFound(job_id.clone()))?;
        match job.status {
            JobStatus::Pending | JobStatus::Running => {
                job.status = JobStatus::Cancelled;
                job.completed_at = Some(Utc::now());
                state.pending.retain(|id| id != job_id);
                state.processing.retain(|id| id != job_id);
                info!(job_id = %job_id, "job cancelled");
                Ok(())
            }
            status => Err(QueueError::invalid_transition(
                job_id.clone(),
                status,
                "cancel",
            )),
        }
    }

    pub fn get(&self, job_id: &JobId) -> Option<Job> {
        self.state.lock().jobs.get(job_id).cloned()
    }

    /// Jobs currently parked in the dead-letter queue.
    pub fn dead_letters(&self) -> Vec<Job> {
        let state = self.state.lock();
        state
            .dlq
            .iter()
            .filter_map(|id| state.jobs.get(id).cloned())
            .collect()
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.state.lock();
        QueueStats {
            pending: state.pending.len(),
            processing: state.processing.len(),
            dlq: state.dlq.len(),
            total: state.jobs.len(),
        }
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}
