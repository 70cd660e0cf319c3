//! # titan-queue
//!
//! Background job infrastructure for Titan-AAS:
//!
//! - [`queue::JobQueue`]: three logical sub-queues (`pending`,
//!   `processing`, `dlq`) with atomic claims, priority ordering,
//!   exponential backoff with jitter and cancel semantics
//! - [`worker::JobWorker`]: task-keyed handler registry with graceful
//!   shutdown that drains in-flight jobs
//! - [`leader::LeaderElection`]: TTL lease with epoch fencing for
//!   singleton workloads
//! - [`scheduler::Scheduler`]: cron-matched minute ticks submitting jobs,
//!   itself running under leader election

pub mod error;
pub mod leader;
pub mod queue;
pub mod scheduler;
pub mod types;
pub mod worker;

pub use error::{QueueError, QueueResult};
pub use leader::{LeaderElection, LeaseStore, MemoryLeaseStore};
pub use queue::{JobQueue, QueueStats};
pub use scheduler::{Scheduler, SchedulerHandle, SchedulePreset, ScheduledJob};
pub use types::{Job, JobId, JobStatus, RetryPolicy};
pub use worker::{JobWorker, TaskHandler, WorkerConfig, WorkerHandle};
