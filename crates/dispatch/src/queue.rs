//! Delayed, retrying in-process job queue
//!
//! One tokio task per job. Handler errors consume a retry attempt and back
//! off exponentially (with jitter); a reschedule request pushes the job to
//! a later time without consuming an attempt. Exhausted attempts park the
//! job in a terminal failed state that is surfaced but not auto-retried.
//! Delivery is at-least-once: a job interrupted mid-handler on restart
//! would run again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use uuid::Uuid;

use dialwave_core::{Error, RetryPolicy};

/// What a job refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobPayload {
    pub contact_id: Uuid,
    pub campaign_id: Uuid,
}

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Ready to run
    Waiting,
    /// Sleeping until its scheduled time
    Delayed,
    /// Handler is executing
    Active,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Cancellable states; an active job is never interrupted
    fn is_pending(&self) -> bool {
        matches!(self, Self::Waiting | Self::Delayed)
    }
}

/// Successful handler result
#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// A call was handed to the telephony provider
    Dispatched { call_id: Uuid },
    /// Structured skip; never retried
    Skipped { reason: String },
}

/// Handler failure modes
#[derive(Debug)]
pub enum JobError {
    /// Push the job to a later time without consuming an attempt
    Reschedule { delay: Duration },
    /// Attempt failed; retried per the job's policy
    Failed(Error),
}

impl From<Error> for JobError {
    fn from(err: Error) -> Self {
        JobError::Failed(err)
    }
}

/// Job executor
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(
        &self,
        payload: &JobPayload,
        attempt: u32,
    ) -> std::result::Result<JobOutcome, JobError>;
}

struct JobEntry {
    payload: JobPayload,
    state: Arc<Mutex<JobState>>,
    done: Arc<Notify>,
    handle: JoinHandle<()>,
}

/// In-process delayed job queue
#[derive(Clone)]
pub struct JobQueue {
    jobs: Arc<DashMap<Uuid, JobEntry>>,
    handler: Arc<dyn JobHandler>,
}

impl JobQueue {
    pub fn new(handler: Arc<dyn JobHandler>) -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
            handler,
        }
    }

    /// Schedule a job after `delay`, retried per `retry`
    pub fn enqueue(&self, payload: JobPayload, delay: Duration, retry: RetryPolicy) -> Uuid {
        let job_id = Uuid::new_v4();
        let state = Arc::new(Mutex::new(if delay.is_zero() {
            JobState::Waiting
        } else {
            JobState::Delayed
        }));
        let done = Arc::new(Notify::new());

        let handle = tokio::spawn(Self::run(
            job_id,
            payload,
            delay,
            retry,
            self.handler.clone(),
            state.clone(),
            done.clone(),
        ));

        self.jobs.insert(
            job_id,
            JobEntry {
                payload,
                state,
                done,
                handle,
            },
        );

        tracing::debug!(job_id = %job_id, delay_ms = delay.as_millis() as u64, "job enqueued");
        job_id
    }

    async fn run(
        job_id: Uuid,
        payload: JobPayload,
        delay: Duration,
        retry: RetryPolicy,
        handler: Arc<dyn JobHandler>,
        state: Arc<Mutex<JobState>>,
        done: Arc<Notify>,
    ) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let max_attempts = retry.max_attempts.max(1);
        let mut attempt = 0u32;
        let mut backoff = Duration::from_secs(retry.delay_minutes as u64 * 60).max(
            // A zero backoff would spin through attempts instantly
            Duration::from_secs(1),
        );

        loop {
            *state.lock() = JobState::Active;

            match handler.handle(&payload, attempt).await {
                Ok(JobOutcome::Dispatched { call_id }) => {
                    tracing::info!(job_id = %job_id, call_id = %call_id, "job completed");
                    *state.lock() = JobState::Completed;
                    break;
                }
                Ok(JobOutcome::Skipped { reason }) => {
                    tracing::info!(job_id = %job_id, reason = %reason, "job skipped");
                    *state.lock() = JobState::Completed;
                    break;
                }
                Err(JobError::Reschedule { delay }) => {
                    // Transient scheduling conflict; the attempt is not consumed
                    tracing::info!(
                        job_id = %job_id,
                        delay_secs = delay.as_secs(),
                        "job rescheduled"
                    );
                    *state.lock() = JobState::Delayed;
                    tokio::time::sleep(delay).await;
                }
                Err(JobError::Failed(error)) => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        tracing::error!(
                            job_id = %job_id,
                            contact_id = %payload.contact_id,
                            attempts = attempt,
                            error = %error,
                            "job failed, attempts exhausted"
                        );
                        *state.lock() = JobState::Failed;
                        break;
                    }
                    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..1000));
                    tracing::warn!(
                        job_id = %job_id,
                        attempt,
                        max_attempts,
                        backoff_secs = backoff.as_secs(),
                        error = %error,
                        "job attempt failed, backing off"
                    );
                    *state.lock() = JobState::Delayed;
                    tokio::time::sleep(backoff + jitter).await;
                    backoff *= 2;
                }
            }
        }

        done.notify_waiters();
    }

    /// Best-effort cancel of pending jobs for a campaign. Active jobs are
    /// left to finish; returns the number of jobs removed.
    pub fn cancel_for_campaign(&self, campaign_id: Uuid) -> usize {
        let mut cancelled = Vec::new();
        for entry in self.jobs.iter() {
            if entry.payload.campaign_id == campaign_id && entry.state.lock().is_pending() {
                cancelled.push(*entry.key());
            }
        }

        let mut removed = 0;
        for job_id in cancelled {
            if let Some((_, entry)) = self.jobs.remove_if(&job_id, |_, e| e.state.lock().is_pending())
            {
                entry.handle.abort();
                entry.done.notify_waiters();
                removed += 1;
                tracing::debug!(job_id = %job_id, "pending job cancelled");
            }
        }
        removed
    }

    pub fn state(&self, job_id: Uuid) -> Option<JobState> {
        self.jobs.get(&job_id).map(|e| *e.state.lock())
    }

    /// Count of jobs currently tracked in a given state
    pub fn count_in_state(&self, state: JobState) -> usize {
        self.jobs
            .iter()
            .filter(|e| *e.state.lock() == state)
            .count()
    }

    /// Wait until a job reaches a terminal state (or is cancelled)
    pub async fn wait(&self, job_id: Uuid) {
        loop {
            let Some((state, done)) = self
                .jobs
                .get(&job_id)
                .map(|e| (*e.state.lock(), e.done.clone()))
            else {
                return;
            };
            if state.is_terminal() {
                return;
            }

            let notified = done.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            // Re-check after registering so a terminal flip cannot be missed
            if let Some(entry) = self.jobs.get(&job_id) {
                if entry.state.lock().is_terminal() {
                    return;
                }
            } else {
                return;
            }
            notified.await;
        }
    }
}
