use thiserror::Error;

use crate::types::{JobId, JobStatus};

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors raised by the job queue.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("job not found: {0}")]
    JobNotFound(JobId),

    #[error("job {job_id} cannot transition from {status} via {operation}")]
    InvalidTransition {
        job_id: JobId,
        status: JobStatus,
        operation: &'static str,
    },

    #[error("no handler registered for task '{0}'")]
    UnknownTask(String),

    #[error("internal queue error: {0}")]
    Internal(String),
}

impl QueueError {
    pub fn invalid_transition(job_id: JobId, status: JobStatus, operation: &'static str) -> Self {
        Self::InvalidTransition {
            job_id,
            status,
            operation,
        }
    }
}
