use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, watch};
use tracing::debug;
use uuid::Uuid;

use super::state::{ExitOutcome, JobState, JobStatus, Transition};
use crate::error::WorkerError;
use crate::output::OutputBuffer;

pub type JobId = Uuid;

/// One spawned external process and everything known about it.
///
/// Identity, command and start time are fixed at creation. The mutable
/// [`JobState`] sits behind a lock owned by this job alone; the output
/// buffer has its own internal lock. When both are needed the state lock
/// is taken first.
#[derive(Debug)]
pub struct Job {
    id: JobId,
    command: String,
    args: Vec<String>,
    start_time: DateTime<Utc>,
    pid: Option<u32>,
    state: Mutex<JobState>,
    output: OutputBuffer,
    reaped: watch::Sender<bool>,
}

impl Job {
    pub(crate) fn new(
        id: JobId,
        command: String,
        args: Vec<String>,
        pid: Option<u32>,
        kill_switch: oneshot::Sender<()>,
    ) -> Self {
        Self {
            id,
            command,
            args,
            start_time: Utc::now(),
            pid,
            state: Mutex::new(JobState::new(kill_switch)),
            output: OutputBuffer::new(),
            reaped: watch::Sender::new(false),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn status(&self) -> JobStatus {
        self.state.lock().status()
    }

    /// Copy of the output captured so far.
    pub fn output(&self) -> Vec<u8> {
        self.output.snapshot()
    }

    pub(crate) fn output_buffer(&self) -> &OutputBuffer {
        &self.output
    }

    /// Consistent point-in-time view of this job.
    pub fn info(&self) -> JobInfo {
        let state = self.state.lock();
        JobInfo {
            id: self.id,
            command: self.command.clone(),
            args: self.args.clone(),
            status: state.status(),
            start_time: self.start_time,
            finished_at: state.finished_at(),
            exit_code: state.exit_code(),
            pid: self.pid,
            error: state.error().map(str::to_owned),
        }
    }

    /// Mark the job `Stopped` and fire the kill switch.
    ///
    /// Everything happens under the state lock, so a supervisor resolving
    /// concurrently either ran first (and this returns `InvalidState`) or
    /// will observe `Stopped` and leave it alone.
    pub(crate) fn stop(&self) -> Result<(), WorkerError> {
        let mut state = self.state.lock();
        let kill_switch = state.stop().map_err(|status| WorkerError::InvalidState {
            id: self.id,
            status,
        })?;

        let delivered = kill_switch.is_some_and(|tx| tx.send(()).is_ok());
        if !delivered {
            debug!(job_id = %self.id, "supervisor already past wait, kill request dropped");
        }
        self.output.seal();
        Ok(())
    }

    pub(crate) fn resolve(&self, outcome: ExitOutcome) -> Transition {
        let mut state = self.state.lock();
        let transition = state.resolve(outcome);
        if let Transition::Applied(_) = transition {
            self.output.seal();
        }
        transition
    }

    pub(crate) fn mark_reaped(&self) {
        self.reaped.send_replace(true);
    }

    /// Resolves once the supervisor has seen the process exit and finished
    /// its bookkeeping.
    pub async fn reaped(&self) {
        let mut rx = self.reaped.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|reaped| *reaped).await;
    }
}

/// Serializable snapshot of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    pub id: JobId,
    pub command: String,
    pub args: Vec<String>,
    pub status: JobStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_job() -> (Job, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        let job = Job::new(
            Uuid::new_v4(),
            "echo".into(),
            vec!["hi".into()],
            Some(42),
            tx,
        );
        (job, rx)
    }

    #[test]
    fn job_creation_defaults() {
        let (job, _rx) = make_job();
        assert_eq!(job.status(), JobStatus::Running);
        assert_eq!(job.command(), "echo");
        assert_eq!(job.args(), ["hi".to_string()]);
        assert_eq!(job.pid(), Some(42));
        assert!(job.output().is_empty());
    }

    #[test]
    fn stop_fires_kill_switch_and_seals_output() {
        let (job, mut rx) = make_job();
        job.output_buffer().append(b"partial");

        job.stop().unwrap();

        assert_eq!(job.status(), JobStatus::Stopped);
        assert!(rx.try_recv().is_ok());
        assert!(!job.output_buffer().append(b" more"));
        assert_eq!(job.output(), b"partial");
    }

    #[test]
    fn second_stop_is_invalid_state() {
        let (job, _rx) = make_job();
        job.stop().unwrap();

        let err = job.stop().unwrap_err();
        assert!(matches!(
            err,
            WorkerError::InvalidState {
                status: JobStatus::Stopped,
                ..
            }
        ));
        assert_eq!(job.status(), JobStatus::Stopped);
    }

    #[test]
    fn stop_survives_dropped_supervisor() {
        let (job, rx) = make_job();
        drop(rx);
        job.stop().unwrap();
        assert_eq!(job.status(), JobStatus::Stopped);
    }

    #[test]
    fn resolve_after_stop_is_discarded() {
        let (job, _rx) = make_job();
        job.stop().unwrap();
        let t = job.resolve(ExitOutcome::Exited {
            success: true,
            code: Some(0),
        });
        assert_eq!(
            t,
            Transition::Discarded {
                current: JobStatus::Stopped
            }
        );
    }

    #[test]
    fn info_reflects_resolution() {
        let (job, _rx) = make_job();
        job.resolve(ExitOutcome::Exited {
            success: false,
            code: Some(2),
        });

        let info = job.info();
        assert_eq!(info.id, job.id());
        assert_eq!(info.status, JobStatus::Failed);
        assert_eq!(info.exit_code, Some(2));
        assert!(info.finished_at.is_some());
        assert!(info.error.is_none());
    }

    #[test]
    fn info_json_shape() {
        let (job, _rx) = make_job();
        let json = serde_json::to_value(job.info()).unwrap();
        assert_eq!(json["status"], "running");
        assert_eq!(json["command"], "echo");
        assert_eq!(json["args"][0], "hi");
        assert!(json.get("exit_code").is_none());
        assert!(json.get("start_time").is_some());
    }

    #[tokio::test]
    async fn reaped_resolves_after_mark() {
        let (job, _rx) = make_job();
        job.mark_reaped();
        tokio::time::timeout(std::time::Duration::from_secs(1), job.reaped())
            .await
            .expect("reaped should resolve");
    }
}
