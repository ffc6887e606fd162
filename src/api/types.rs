//! Request and response bodies exchanged between the server and the CLI.
//!
//! Job snapshots travel as [`JobInfo`](crate::state_machine::JobInfo); the
//! types here cover everything else.

use serde::{Deserialize, Serialize};

use crate::state_machine::{JobId, JobStatus};

/// Body of `POST /jobs/start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    /// Executable name or path. Resolved via `PATH`, never through a shell.
    pub command: String,
    /// Arguments passed verbatim.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Body returned by `POST /jobs/stop`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopResponse {
    pub id: JobId,
    pub status: JobStatus,
}

/// JSON body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}
