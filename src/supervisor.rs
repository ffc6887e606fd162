//! Per-job supervision.
//!
//! Every job gets one [`supervise`] task that owns the child process, waits
//! for it to exit and resolves the job's terminal status, plus one
//! [`capture`] task per output pipe feeding the job's output buffer.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::WorkerError;
use crate::state_machine::{ExitOutcome, Job, Transition};

const CHUNK_SIZE: usize = 8 * 1024;

/// Wait for `child` to exit and resolve `job` exactly once.
///
/// A message on `kill_switch` makes the supervisor kill the child and keep
/// waiting for it. The wait never holds any lock. Errors from the wait are
/// recorded as a `Failed` job, never propagated.
pub(crate) async fn supervise(
    job: Arc<Job>,
    mut child: Child,
    kill_switch: oneshot::Receiver<()>,
    capture_tasks: Vec<JoinHandle<()>>,
    drain_timeout: Duration,
) {
    let job_id = job.id();

    let waited = tokio::select! {
        status = child.wait() => status,
        _ = kill_switch => {
            debug!(%job_id, "kill requested");
            if let Err(err) = child.start_kill() {
                // Usually means the process is already gone.
                debug!(%job_id, error = %err, "kill signal not delivered");
            }
            child.wait().await
        }
    };

    drain(job_id.to_string(), capture_tasks, drain_timeout).await;

    let outcome = match waited {
        Ok(status) => ExitOutcome::from(status),
        Err(err) => {
            let err = WorkerError::WaitFailure(err);
            warn!(%job_id, error = %err, "wait on job process failed");
            ExitOutcome::WaitFailed(err.to_string())
        }
    };

    match job.resolve(outcome) {
        Transition::Applied(status) => {
            let exit_code = job.info().exit_code;
            info!(%job_id, %status, ?exit_code, "job finished");
        }
        Transition::Discarded { current } => {
            debug!(%job_id, %current, "job already terminal, exit result discarded");
        }
    }

    job.mark_reaped();
}

/// Give the capture tasks until `timeout` to hit EOF. A descendant process
/// can keep a pipe open after the child itself exits; such readers are
/// aborted rather than waited on forever.
async fn drain(job_id: String, capture_tasks: Vec<JoinHandle<()>>, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    for mut task in capture_tasks {
        match tokio::time::timeout_at(deadline, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(%job_id, error = %err, "output capture task failed"),
            Err(_) => {
                warn!(%job_id, "output pipe still open after exit, abandoning it");
                task.abort();
            }
        }
    }
}

/// Copy `stream` into the job's output buffer until EOF, a read error, or
/// the buffer is sealed.
pub(crate) async fn capture<R>(mut stream: R, job: Arc<Job>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if !job.output_buffer().append(&buf[..n]) {
                    debug!(job_id = %job.id(), "output sealed, capture stopped");
                    break;
                }
            }
            Err(err) => {
                debug!(job_id = %job.id(), error = %err, "output read failed");
                break;
            }
        }
    }
}
