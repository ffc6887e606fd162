mod job;
mod state;

pub use job::{Job, JobId, JobInfo};
pub use state::{ExitOutcome, JobState, JobStatus, Transition};
