//! Bounded polling of asynchronous control-plane jobs.

use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::backend::{ControlPlane, JobStatus, RemoteError};
use crate::types::JobId;

/// Default interval between job status polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);
/// Default ceiling for a single job wait.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(180);

/// Errors raised while waiting on a job.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum JobError {
    /// The job reached a failed terminal state.
    #[error("job {job_id} finished with status '{status}'")]
    Failed {
        /// Job identifier.
        job_id: JobId,
        /// Provider status string.
        status: String,
    },
    /// The job did not finish before the deadline.
    #[error("timeout after {waited:?} waiting for job {job_id}")]
    Timeout {
        /// Job identifier.
        job_id: JobId,
        /// Time spent polling.
        waited: Duration,
    },
    /// The provider does not know the job.
    #[error("job {job_id} not found")]
    NotFound {
        /// Job identifier.
        job_id: JobId,
    },
    /// Describing the job failed with a non-transient error.
    #[error("job {job_id} could not be described: {source}")]
    Remote {
        /// Job identifier.
        job_id: JobId,
        /// Underlying control-plane error.
        #[source]
        source: RemoteError,
    },
}

/// Polls a job at a fixed interval until it finishes or a deadline passes.
///
/// Dropping the returned future cancels the wait.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct JobWaiter {
    poll_interval: Duration,
    timeout: Duration,
}

impl Default for JobWaiter {
    fn default() -> Self {
        Self::new(POLL_INTERVAL, WAIT_TIMEOUT)
    }
}

impl JobWaiter {
    /// Creates a waiter with explicit timings.
    #[must_use]
    pub const fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
        }
    }

    /// Returns the configured overall timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Waits for `job` using the configured timeout.
    ///
    /// # Errors
    ///
    /// See [`JobWaiter::wait_until`].
    pub async fn wait<P>(&self, plane: &P, job: &JobId) -> Result<(), JobError>
    where
        P: ControlPlane + ?Sized,
    {
        self.wait_until(plane, job, Instant::now() + self.timeout)
            .await
    }

    /// Waits for `job` until `deadline`.
    ///
    /// Transport failures are retried on the next tick. No sleep extends past
    /// the deadline.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Failed`] on a failed terminal state,
    /// [`JobError::NotFound`] when the job is unknown, [`JobError::Remote`]
    /// when the provider rejects the describe call, and
    /// [`JobError::Timeout`] when the deadline passes first.
    pub async fn wait_until<P>(
        &self,
        plane: &P,
        job: &JobId,
        deadline: Instant,
    ) -> Result<(), JobError>
    where
        P: ControlPlane + ?Sized,
    {
        let started = Instant::now();
        while Instant::now() <= deadline {
            match plane.describe_job(job).await {
                Ok(Some(JobStatus::Successful)) => {
                    debug!(job_id = %job, "job finished");
                    return Ok(());
                }
                Ok(Some(JobStatus::Failed { status })) => {
                    return Err(JobError::Failed {
                        job_id: job.clone(),
                        status,
                    });
                }
                Ok(Some(status)) => debug!(job_id = %job, ?status, "job still running"),
                Ok(None) => {
                    return Err(JobError::NotFound {
                        job_id: job.clone(),
                    });
                }
                Err(err) if err.is_transient() => {
                    warn!(job_id = %job, error = %err, "job poll failed, retrying");
                }
                Err(err) => {
                    return Err(JobError::Remote {
                        job_id: job.clone(),
                        source: err,
                    });
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            sleep(self.poll_interval.min(remaining)).await;
        }

        Err(JobError::Timeout {
            job_id: job.clone(),
            waited: started.elapsed(),
        })
    }
}
