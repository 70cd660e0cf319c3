//! Cron scheduler.
//!
//! Owns `(name, task, cron_expression, payload)` tuples. On every minute
//! tick, each enabled entry whose schedule matches the current UTC minute
//! submits a job to the queue. The scheduler runs under leader election so
//! exactly one instance in a deployment fires.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Timelike, Utc};
use cron::Schedule;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{QueueError, QueueResult};
use crate::leader::LeaderElection;
use crate::queue::JobQueue;
use crate::types::Job;

/// Common schedules, spelled as six-field cron expressions
/// (`sec min hour dom mon dow`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulePreset {
    EveryMinute,
    Hourly,
    DailyMidnight,
}

impl SchedulePreset {
    pub fn expression(&self) -> &'static str {
        match self {
            Self::EveryMinute => "0 * * * * *",
            Self::Hourly => "0 0 * * * *",
            Self::DailyMidnight => "0 0 0 * * *",
        }
    }
}

/// One scheduled entry.
#[derive(Clone)]
pub struct ScheduledJob {
    pub name: String,
    pub task: String,
    pub schedule: Schedule,
    pub payload: Value,
    pub enabled: bool,
}

impl ScheduledJob {
    pub fn new(
        name: impl Into<String>,
        task: impl Into<String>,
        expression: &str,
        payload: Value,
    ) -> QueueResult<Self> {
        let schedule = Schedule::from_str(expression)
            .map_err(|e| QueueError::Internal(format!("invalid cron expression: {e}")))?;
        Ok(Self {
            name: name.into(),
            task: task.into(),
            schedule,
            payload,
            enabled: true,
        })
    }

    pub fn preset(
        name: impl Into<String>,
        task: impl Into<String>,
        preset: SchedulePreset,
        payload: Value,
    ) -> Self {
        // preset expressions are statically valid
        Self::new(name, task, preset.expression(), payload)
            .unwrap_or_else(|_| unreachable!("preset cron expressions parse"))
    }

    /// Whether this entry fires in the minute containing `now`.
    pub fn due(&self, now: chrono::DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(minute_start) = now.with_second(0).and_then(|t| t.with_nanosecond(0)) else {
            return false;
        };
        self.schedule.includes(minute_start)
    }
}

/// Handle for stopping the scheduler loop.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    join_handle: JoinHandle<()>,
}

impl SchedulerHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.join_handle.await;
    }
}

/// Minute-tick scheduler submitting due jobs to the queue.
pub struct Scheduler {
    queue: Arc<JobQueue>,
    jobs: Vec<ScheduledJob>,
    leader: Option<Arc<LeaderElection>>,
    tenant_id: String,
}

impl Scheduler {
    pub fn new(queue: Arc<JobQueue>, tenant_id: impl Into<String>) -> Self {
        Self {
            queue,
            jobs: Vec::new(),
            leader: None,
            tenant_id: tenant_id.into(),
        }
    }

    pub fn add_job(mut self, job: ScheduledJob) -> Self {
        info!(name = %job.name, task = %job.task, "registered scheduled job");
        self.jobs.push(job);
        self
    }

    pub fn with_leader_election(mut self, leader: Arc<LeaderElection>) -> Self {
        self.leader = Some(leader);
        self
    }

    /// Submit every due entry for the minute containing `now`.
    /// Returns how many jobs were submitted.
    pub fn tick(&self, now: chrono::DateTime<Utc>) -> usize {
        let mut submitted = 0;
        for entry in &self.jobs {
            if entry.due(now) {
                let job = Job::new(entry.task.clone(), entry.payload.clone(), &self.tenant_id);
                info!(name = %entry.name, task = %entry.task, job_id = %job.id,
                      "scheduled job submitted");
                self.queue.submit(job);
                submitted += 1;
            }
        }
        submitted
    }

    /// Start the minute-tick loop.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let join_handle = tokio::spawn(async move {
            info!(jobs = self.jobs.len(), "scheduler started");
            loop {
                if *shutdown_rx.borrow() {
                    break;
                }

                let leading = self
                    .leader
                    .as_ref()
                    .map(|leader| leader.is_leader())
                    .unwrap_or(true);
                if leading {
                    self.tick(Utc::now());
                } else {
                    warn!("scheduler standing by; not the leader");
                }

                // sleep to the start of the next minute
                let now = Utc::now();
                let until_next_minute = 60 - u64::from(now.second().min(59));
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(until_next_minute)) => {}
                    _ = shutdown_rx.changed() => {}
                }
            }
            info!("scheduler stopped");
        });

        SchedulerHandle {
            shutdown_tx,
            join_handle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn presets_parse_and_fire() {
        let midnight = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 30).unwrap();
        let noon = Utc.with_ymd_and_hms(2026, 3, 1, 12, 15, 0).unwrap();

        let every_minute = ScheduledJob::preset(
            "heartbeat",
            "noop",
            SchedulePreset::EveryMinute,
            json!({}),
        );
        assert!(every_minute.due(midnight));
        assert!(every_minute.due(noon));

        let daily = ScheduledJob::preset(
            "cleanup",
            "cleanup_orphaned_blobs",
            SchedulePreset::DailyMidnight,
            json!({}),
        );
        assert!(daily.due(midnight));
        assert!(!daily.due(noon));

        let hourly =
            ScheduledJob::preset("warmup", "cache_warmup", SchedulePreset::Hourly, json!({}));
        assert!(hourly.due(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 59).unwrap()));
        assert!(!hourly.due(noon));
    }

    #[test]
    fn disabled_jobs_never_fire() {
        let mut entry = ScheduledJob::preset(
            "heartbeat",
            "noop",
            SchedulePreset::EveryMinute,
            json!({}),
        );
        entry.enabled = false;
        assert!(!entry.due(Utc::now()));
    }

    #[test]
    fn tick_submits_due_jobs() {
        let queue = Arc::new(JobQueue::new());
        let scheduler = Scheduler::new(queue.clone(), "default").add_job(ScheduledJob::preset(
            "heartbeat",
            "noop",
            SchedulePreset::EveryMinute,
            json!({"source": "scheduler"}),
        ));

        let submitted = scheduler.tick(Utc::now());
        assert_eq!(submitted, 1);
        assert_eq!(queue.stats().pending, 1);
    }

    #[test]
    fn invalid_expression_is_rejected() {
        assert!(ScheduledJob::new("x", "y", "not a cron", json!({})).is_err());
    }
}
