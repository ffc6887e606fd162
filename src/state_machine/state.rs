use std::fmt;
use std::process::ExitStatus;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Lifecycle status of a job.
///
/// `Running` is the only non-terminal value. Once a job reaches
/// `Completed`, `Failed` or `Stopped` it never leaves that state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    Stopped,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Stopped => "stopped",
        };
        f.pad(name)
    }
}

/// How the supervised process ended, as observed by its supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    /// The process exited. `code` is `None` when it was killed by a signal.
    Exited { success: bool, code: Option<i32> },
    /// Waiting on the process failed; the exit status is unknown.
    WaitFailed(String),
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        ExitOutcome::Exited {
            success: status.success(),
            code: status.code(),
        }
    }
}

/// The result of asking the state machine to resolve a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The job moved from `Running` into this terminal status.
    Applied(JobStatus),
    /// The job was already terminal; the outcome was dropped.
    Discarded { current: JobStatus },
}

/// Mutable part of a job, always accessed under the job's own lock.
#[derive(Debug)]
pub struct JobState {
    status: JobStatus,
    exit_code: Option<i32>,
    error: Option<String>,
    finished_at: Option<DateTime<Utc>>,
    // Present while the supervisor may still act on a kill request.
    kill_switch: Option<oneshot::Sender<()>>,
}

impl JobState {
    pub(crate) fn new(kill_switch: oneshot::Sender<()>) -> Self {
        Self {
            status: JobStatus::Running,
            exit_code: None,
            error: None,
            finished_at: None,
            kill_switch: Some(kill_switch),
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Accept a stop request.
    ///
    /// Only a `Running` job can be stopped. On success the status becomes
    /// `Stopped` and the kill switch is handed back so the caller can fire it
    /// while still holding the job lock. On failure the current terminal
    /// status is returned and nothing changes.
    pub(crate) fn stop(&mut self) -> Result<Option<oneshot::Sender<()>>, JobStatus> {
        if self.status.is_terminal() {
            return Err(self.status);
        }
        self.status = JobStatus::Stopped;
        self.finished_at = Some(Utc::now());
        Ok(self.kill_switch.take())
    }

    /// Apply the supervisor's view of how the process ended.
    ///
    /// - `Running` + successful exit → `Completed`
    /// - `Running` + non-zero exit, signal death or wait error → `Failed`
    /// - any terminal status (a stop already won) → unchanged
    pub(crate) fn resolve(&mut self, outcome: ExitOutcome) -> Transition {
        if self.status.is_terminal() {
            return Transition::Discarded {
                current: self.status,
            };
        }

        self.status = match outcome {
            ExitOutcome::Exited { success, code } => {
                self.exit_code = code;
                if success {
                    JobStatus::Completed
                } else {
                    JobStatus::Failed
                }
            }
            ExitOutcome::WaitFailed(message) => {
                self.error = Some(message);
                JobStatus::Failed
            }
        };
        self.finished_at = Some(Utc::now());
        self.kill_switch = None;

        Transition::Applied(self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_state() -> (JobState, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (JobState::new(tx), rx)
    }

    #[test]
    fn new_state_is_running() {
        let (state, _rx) = running_state();
        assert_eq!(state.status(), JobStatus::Running);
        assert!(state.finished_at().is_none());
        assert!(state.exit_code().is_none());
    }

    #[test]
    fn successful_exit_completes() {
        let (mut state, _rx) = running_state();
        let t = state.resolve(ExitOutcome::Exited {
            success: true,
            code: Some(0),
        });
        assert_eq!(t, Transition::Applied(JobStatus::Completed));
        assert_eq!(state.exit_code(), Some(0));
        assert!(state.finished_at().is_some());
    }

    #[test]
    fn non_zero_exit_fails() {
        let (mut state, _rx) = running_state();
        let t = state.resolve(ExitOutcome::Exited {
            success: false,
            code: Some(3),
        });
        assert_eq!(t, Transition::Applied(JobStatus::Failed));
        assert_eq!(state.exit_code(), Some(3));
    }

    #[test]
    fn wait_failure_fails_and_keeps_message() {
        let (mut state, _rx) = running_state();
        let t = state.resolve(ExitOutcome::WaitFailed("no child".into()));
        assert_eq!(t, Transition::Applied(JobStatus::Failed));
        assert_eq!(state.error(), Some("no child"));
        assert!(state.exit_code().is_none());
    }

    #[test]
    fn stop_hands_out_kill_switch_once() {
        let (mut state, mut rx) = running_state();
        let kill = state.stop().unwrap().expect("kill switch present");
        assert_eq!(state.status(), JobStatus::Stopped);

        kill.send(()).unwrap();
        assert!(rx.try_recv().is_ok());

        assert_eq!(state.stop().unwrap_err(), JobStatus::Stopped);
    }

    #[test]
    fn stop_wins_over_later_exit() {
        let (mut state, _rx) = running_state();
        state.stop().unwrap();

        let t = state.resolve(ExitOutcome::Exited {
            success: true,
            code: Some(0),
        });
        assert_eq!(
            t,
            Transition::Discarded {
                current: JobStatus::Stopped
            }
        );
        assert_eq!(state.status(), JobStatus::Stopped);
        assert!(state.exit_code().is_none());
    }

    #[test]
    fn terminal_states_are_absorbing() {
        let (mut state, _rx) = running_state();
        state.resolve(ExitOutcome::Exited {
            success: false,
            code: Some(1),
        });

        assert_eq!(state.stop().unwrap_err(), JobStatus::Failed);
        let t = state.resolve(ExitOutcome::Exited {
            success: true,
            code: Some(0),
        });
        assert_eq!(
            t,
            Transition::Discarded {
                current: JobStatus::Failed
            }
        );
        assert_eq!(state.exit_code(), Some(1));
    }

    #[test]
    fn status_display_and_serde_are_lowercase() {
        assert_eq!(JobStatus::Running.to_string(), "running");
        assert_eq!(JobStatus::Stopped.to_string(), "stopped");
        assert_eq!(format!("{:<9}|", JobStatus::Failed), "failed   |");
        assert_eq!(
            serde_json::to_string(&JobStatus::Completed).unwrap(),
            "\"completed\""
        );
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}
