use thiserror::Error;

use crate::state_machine::{JobId, JobStatus};

/// Failures reported by the job registry and its supervisors.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job {id} is already {status}")]
    InvalidState { id: JobId, status: JobStatus },

    #[error("Failed to spawn `{command}`: {source}")]
    SpawnFailure {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting on job process: {0}")]
    WaitFailure(#[source] std::io::Error),
}
