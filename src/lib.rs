//! Run client-submitted commands as supervised background jobs.
//!
//! [`JobRegistry`] is the core: it spawns processes, tracks each job's state
//! while a per-job supervisor waits on the process, serves captured output,
//! and stops jobs safely against their natural exit. The [`server`] and
//! [`api`] modules wrap it in an authenticated HTTP API and client.

pub mod api;
pub mod config;
pub mod error;
pub mod output;
pub mod registry;
pub mod server;
pub mod state_machine;
pub mod ui;

mod supervisor;

pub use error::WorkerError;
pub use registry::JobRegistry;
pub use state_machine::{Job, JobId, JobInfo, JobStatus};
