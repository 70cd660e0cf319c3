//! Background worker.
//!
//! Registers handlers keyed by task string and processes claimed jobs
//! until told to stop. Shutdown is graceful: the poll loop exits first,
//! then in-flight jobs are awaited before the handle resolves. Unknown
//! tasks fail with no retry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

use crate::leader::LeaderElection;
use crate::queue::JobQueue;
use crate::types::Job;

/// A handler for one task type.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Execute the job; the returned value is stored as the job result.
    async fn handle(&self, job: Job) -> Result<Option<Value>, String>;
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub name: String,
    /// Pause between claim attempts when the queue is empty
    pub poll_interval: Duration,
    /// Upper bound on concurrently executing jobs
    pub max_in_flight: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            poll_interval: Duration::from_millis(250),
            max_in_flight: 4,
        }
    }
}

/// Handle for stopping a running worker.
pub struct WorkerHandle {
    shutdown_tx: watch::Sender<bool>,
    join_handle: JoinHandle<()>,
}

impl WorkerHandle {
    /// Request shutdown and wait for in-flight jobs to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.join_handle.await;
    }
}

/// Polls the queue and dispatches jobs to registered handlers.
pub struct JobWorker {
    queue: Arc<JobQueue>,
    config: WorkerConfig,
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
    leader: Option<Arc<LeaderElection>>,
}

impl JobWorker {
    pub fn new(queue: Arc<JobQueue>, config: WorkerConfig) -> Self {
        Self {
            queue,
            config,
            handlers: HashMap::new(),
            leader: None,
        }
    }

    /// Register a handler for a task type.
    pub fn register_handler(mut self, task: impl Into<String>, handler: Arc<dyn TaskHandler>) -> Self {
        let task = task.into();
        info!(task = %task, worker = %self.config.name, "registered task handler");
        self.handlers.insert(task, handler);
        self
    }

    /// Make this a singleton worker: only the lease holder processes.
    pub fn with_leader_election(mut self, leader: Arc<LeaderElection>) -> Self {
        self.leader = Some(leader);
        self
    }

    /// Start the processing loop.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let JobWorker {
            queue,
            config,
            handlers,
            leader,
        } = self;
        let handlers = Arc::new(handlers);

        let join_handle = tokio::spawn(async move {
            let mut in_flight: JoinSet<()> = JoinSet::new();
            info!(worker = %config.name, "worker started");

            loop {
                if *shutdown_rx.borrow() {
                    break;
                }

                // non-leaders sleep and re-check
                if let Some(leader) = &leader {
                    if !leader.is_leader() {
                        tokio::select! {
                            _ = tokio::time::sleep(config.poll_interval) => continue,
                            _ = shutdown_rx.changed() => continue,
                        }
                    }
                }

                while in_flight.len() >= config.max_in_flight {
                    let _ = in_flight.join_next().await;
                }

                match queue.claim() {
                    Some(job) => {
                        let queue = Arc::clone(&queue);
                        let handlers = Arc::clone(&handlers);
                        in_flight.spawn(async move {
                            process_job(&queue, &handlers, job).await;
                        });
                    }
                    None => {
                        tokio::select! {
                            _ = tokio::time::sleep(config.poll_interval) => {}
                            _ = shutdown_rx.changed() => {}
                        }
                    }
                }
            }

            // drain in-flight jobs before exiting
            while in_flight.join_next().await.is_some() {}
            info!(worker = %config.name, "worker stopped");
        });

        WorkerHandle {
            shutdown_tx,
            join_handle,
        }
    }
}

async fn process_job(
    queue: &JobQueue,
    handlers: &HashMap<String, Arc<dyn TaskHandler>>,
    job: Job,
) {
    let job_id = job.id.clone();
    let task = job.task.clone();

    let Some(handler) = handlers.get(&task) else {
        error!(job_id = %job_id, task = %task, "unknown task; no retry");
        let _ = queue.fail(&job_id, format!("unknown task type: {task}"), false);
        return;
    };

    match handler.handle(job).await {
        Ok(result) => {
            if let Err(reason) = queue.complete(&job_id, result) {
                // cancel wins over a late completion
                warn!(job_id = %job_id, %reason, "completion discarded");
            }
        }
        Err(reason) => {
            let _ = queue.fail(&job_id, reason, true);
        }
    }
}
