//! The shared index of all jobs.
//!
//! Lock order: the registry map lock is only ever held for membership
//! (insert, lookup, listing) and is always released before a job's own lock
//! is taken. Spawning and waiting happen with no lock held at all.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::process::Command;
use tokio::sync::oneshot;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::WorkerError;
use crate::state_machine::{Job, JobId, JobStatus};
use crate::supervisor;

/// Default time a supervisor waits for output pipes to close after exit.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Creates, finds, stops and reads the output of jobs.
///
/// Safe to share between any number of concurrent callers; wrap it in an
/// `Arc` and hand it to whoever needs it. Must be used from inside a Tokio
/// runtime, since creating a job spawns its supervisor.
#[derive(Debug)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Arc<Job>>>,
    tasks: TaskTracker,
    drain_timeout: Duration,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::with_drain_timeout(DEFAULT_DRAIN_TIMEOUT)
    }

    pub fn with_drain_timeout(drain_timeout: Duration) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            tasks: TaskTracker::new(),
            drain_timeout,
        }
    }

    /// Launch `command` with `args` and start supervising it.
    ///
    /// Arguments go straight to the process, no shell is involved. If the
    /// process cannot be launched nothing is registered and
    /// [`WorkerError::SpawnFailure`] is returned.
    pub fn create(
        &self,
        command: impl Into<String>,
        args: Vec<String>,
    ) -> Result<Arc<Job>, WorkerError> {
        let command = command.into();

        let mut child = Command::new(&command)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                warn!(%command, error = %source, "failed to spawn job");
                WorkerError::SpawnFailure {
                    command: command.clone(),
                    source,
                }
            })?;

        let (kill_tx, kill_rx) = oneshot::channel();
        let job = Arc::new(Job::new(
            Uuid::new_v4(),
            command,
            args,
            child.id(),
            kill_tx,
        ));

        self.jobs.write().insert(job.id(), Arc::clone(&job));

        let mut captures = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            captures.push(self.tasks.spawn(supervisor::capture(stdout, Arc::clone(&job))));
        }
        if let Some(stderr) = child.stderr.take() {
            captures.push(self.tasks.spawn(supervisor::capture(stderr, Arc::clone(&job))));
        }
        self.tasks.spawn(supervisor::supervise(
            Arc::clone(&job),
            child,
            kill_rx,
            captures,
            self.drain_timeout,
        ));

        info!(
            job_id = %job.id(),
            command = %job.command(),
            pid = ?job.pid(),
            "job started"
        );
        Ok(job)
    }

    pub fn get(&self, id: &JobId) -> Result<Arc<Job>, WorkerError> {
        self.jobs
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| WorkerError::NotFound(id.to_string()))
    }

    /// Stop a running job.
    ///
    /// Success means the job is now `Stopped` and the kill was requested, not
    /// that the process has already exited.
    pub fn stop(&self, id: &JobId) -> Result<(), WorkerError> {
        let job = self.get(id)?;
        job.stop()?;
        info!(job_id = %id, "job stopped");
        Ok(())
    }

    pub fn output(&self, id: &JobId) -> Result<Vec<u8>, WorkerError> {
        Ok(self.get(id)?.output())
    }

    /// Every job ever created, in no particular order.
    pub fn list(&self) -> Vec<Arc<Job>> {
        self.jobs.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop every running job and wait for all supervisors to finish.
    pub async fn shutdown(&self) {
        let jobs = self.list();
        let mut stopped = 0usize;
        for job in jobs {
            if job.status() != JobStatus::Running {
                continue;
            }
            match job.stop() {
                Ok(()) => stopped += 1,
                // Lost the race against its own exit.
                Err(err) => debug!(job_id = %job.id(), error = %err, "skip stop on shutdown"),
            }
        }

        self.tasks.close();
        self.tasks.wait().await;
        info!(stopped, "job registry shut down");
    }
}
